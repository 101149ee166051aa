use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, anyhow, bail};
use chrono::Weekday;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::controller::{CellRef, Controller, Outcome};
use crate::export::{self, ExportFormat};
use crate::grid::{self, Grid};
use crate::palette::{SWATCHES, resolve_swatch};
use crate::prompt::{InputPrompt, ScriptedPrompt, TerminalPrompt};
use crate::render::Renderer;
use crate::schedule::{RowId, Schedule, WEEK};
use crate::storage::KeyValueStore;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show", "add", "time", "edit", "color", "delete", "reset", "export", "shell", "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(schedule, cfg, renderer, inv))]
pub fn dispatch<S: KeyValueStore>(
    schedule: Schedule<S>,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "show" => cmd_show(&schedule, renderer),
        "add" => cmd_add(schedule),
        "time" => cmd_time(schedule, &inv.command_args),
        "edit" => cmd_edit(schedule, &inv.command_args),
        "color" => cmd_color(schedule, &inv.command_args),
        "delete" => cmd_delete(schedule, &inv.command_args),
        "reset" => cmd_reset(schedule, cfg),
        "export" => cmd_export(&schedule, &inv.command_args),
        "shell" => {
            let mut ctl = Controller::new(schedule, TerminalPrompt::stdio());
            run_shell(&mut ctl, renderer)
        }
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn current_grid<S: KeyValueStore>(schedule: &Schedule<S>) -> Grid {
    grid::render(&schedule.list_rows(), schedule.data())
}

fn cmd_show<S: KeyValueStore>(schedule: &Schedule<S>, renderer: &mut Renderer) -> anyhow::Result<()> {
    renderer.print_grid(&current_grid(schedule), &[])
}

fn cmd_add<S: KeyValueStore>(schedule: Schedule<S>) -> anyhow::Result<()> {
    let mut ctl = Controller::new(schedule, ScriptedPrompt::new());
    let id = ctl.add_row();
    let position = ctl
        .grid()
        .position(&id)
        .ok_or_else(|| anyhow!("new row {id} is missing from the grid"))?;
    info!(row = %id, position, "command add");
    println!("Added row {position} ({id}).");
    Ok(())
}

#[instrument(skip(schedule))]
fn cmd_time<S: KeyValueStore>(schedule: Schedule<S>, args: &[String]) -> anyhow::Result<()> {
    let [row, time] = args else {
        bail!("usage: time <row> <HH:MM>");
    };
    let id = resolve_row(&current_grid(&schedule), row)?;

    let mut ctl = Controller::new(schedule, ScriptedPrompt::new().answer(time.as_str()));
    if settle(ctl.click(CellRef::Time(id.clone()), false))? == Outcome::Cancelled {
        println!("Row {row} left unchanged.");
        return Ok(());
    }

    let grid = ctl.grid();
    if let (Some(position), Some(renamed)) = (grid.position(&id), grid.row(&id)) {
        println!("Row {row} is now {}; shown as row {position}.", renamed.label());
    }
    Ok(())
}

#[instrument(skip(schedule))]
fn cmd_edit<S: KeyValueStore>(schedule: Schedule<S>, args: &[String]) -> anyhow::Result<()> {
    let Some((row, rest)) = args.split_first() else {
        bail!("usage: edit <row> <day> [text...]");
    };
    let Some((day, words)) = rest.split_first() else {
        bail!("usage: edit <row> <day> [text...]");
    };
    let id = resolve_row(&current_grid(&schedule), row)?;
    let day = parse_day(day)?;
    let text = words.join(" ");

    let mut ctl = Controller::new(schedule, ScriptedPrompt::new().answer(text.as_str()));
    settle(ctl.click(CellRef::Task(id, day), false))?;

    if text.is_empty() {
        println!("Cleared row {row} on {day}.");
    } else {
        println!("Set row {row} on {day} to {text:?}.");
    }
    Ok(())
}

#[instrument(skip(schedule))]
fn cmd_color<S: KeyValueStore>(schedule: Schedule<S>, args: &[String]) -> anyhow::Result<()> {
    let [row, day, swatch] = args else {
        bail!("usage: color <row> <day> <swatch>");
    };
    let id = resolve_row(&current_grid(&schedule), row)?;
    let day = parse_day(day)?;
    let swatch = resolve_swatch(swatch).ok_or_else(|| anyhow!("unknown swatch: {swatch}"))?;

    let mut ctl = Controller::new(schedule, ScriptedPrompt::new());
    settle(ctl.swatch(id.clone(), day, swatch.color))?;

    let now_colored = ctl
        .schedule()
        .cell(&id, day)
        .is_some_and(|cell| !cell.color.is_empty());
    if now_colored {
        println!("Colored row {row} on {day} {}.", swatch.name);
    } else {
        println!("Removed {} from row {row} on {day}.", swatch.name);
    }
    Ok(())
}

#[instrument(skip(schedule))]
fn cmd_delete<S: KeyValueStore>(schedule: Schedule<S>, args: &[String]) -> anyhow::Result<()> {
    if args.is_empty() {
        bail!("usage: delete <row>...");
    }
    let grid = current_grid(&schedule);
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    for token in args {
        let id = resolve_row(&grid, token)?;
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }

    let count = ids.len();
    let mut ctl = Controller::new(schedule, ScriptedPrompt::new());
    for id in ids {
        ctl.click(CellRef::Time(id), true);
    }
    settle(ctl.backspace())?;

    info!(count, "command delete");
    println!("Deleted {count} row(s).");
    Ok(())
}

#[instrument(skip(schedule, cfg))]
fn cmd_reset<S: KeyValueStore>(schedule: Schedule<S>, cfg: &Config) -> anyhow::Result<()> {
    let outcome = if cfg.get_bool("confirmation").unwrap_or(true) {
        Controller::new(schedule, TerminalPrompt::stdio()).reset()
    } else {
        Controller::new(schedule, ScriptedPrompt::new().confirm_with(true)).reset()
    };

    match outcome {
        Outcome::Cancelled => println!("Reset cancelled."),
        _ => println!("Schedule reset."),
    }
    Ok(())
}

#[instrument(skip(schedule))]
fn cmd_export<S: KeyValueStore>(schedule: &Schedule<S>, args: &[String]) -> anyhow::Result<()> {
    let (format, path) = match args {
        [format] => (format.parse::<ExportFormat>()?, None),
        [format, path] => (format.parse::<ExportFormat>()?, Some(PathBuf::from(path))),
        _ => bail!("usage: export <text|csv|json> [path]"),
    };

    let path = match path {
        Some(path) => path,
        None => {
            let dir = std::env::current_dir().context("failed to resolve current directory")?;
            export::default_path(&dir, format)
        }
    };

    export::export(&current_grid(schedule), format, &path)?;
    println!("Exported {format} to {}.", path.display());
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("Commands: show, add, time, edit, color, delete, reset, export, shell, help, version");
    println!("  time <row> <HH:MM>          rename a row");
    println!("  edit <row> <day> [text...]  set a task, no text clears it");
    println!("  color <row> <day> <swatch>  toggle a highlight");
    println!("  delete <row>...             remove rows and their tasks");
    println!("  export <text|csv|json> [path]");
    println!("Rows are the numbers in the first column. Days are 0-6 or names (sun, mon, ...).");
    println!("Swatches: {}", swatch_list());
    Ok(())
}

/// Interactive loop: each line is one controller event.
pub fn run_shell<S, R, W>(
    ctl: &mut Controller<S, TerminalPrompt<R, W>>,
    renderer: &mut Renderer,
) -> anyhow::Result<()>
where
    S: KeyValueStore,
    R: BufRead,
    W: Write,
{
    renderer.print_grid(&ctl.grid(), ctl.selection())?;
    loop {
        write!(ctl.prompt_mut().output(), "weekgrid> ")?;
        ctl.prompt_mut().output().flush()?;

        let Some(line) = ctl.prompt_mut().read_line() else {
            break;
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            continue;
        };

        let outcome = match shell_event(ctl, command, args) {
            Ok(ShellStep::Quit) => break,
            Ok(ShellStep::Redraw(outcome)) => outcome,
            Ok(ShellStep::Show) => Outcome::Selection,
            Ok(ShellStep::Help) => {
                writeln!(ctl.prompt_mut().output(), "{}", SHELL_HELP)?;
                writeln!(ctl.prompt_mut().output(), "swatches: {}", swatch_list())?;
                continue;
            }
            Err(err) => {
                ctl.prompt_mut().alert(&format!("{err:#}"));
                continue;
            }
        };

        debug!(?outcome, "shell event handled");
        if matches!(
            outcome,
            Outcome::Selection | Outcome::Edited | Outcome::Structural
        ) {
            renderer.print_grid(&ctl.grid(), ctl.selection())?;
        }
    }
    Ok(())
}

const SHELL_HELP: &str = "\
click <row> <day|time>      edit a cell, or every selected cell
ctrl <row> <day|time>       toggle a cell in the selection
swatch <row> <day> <swatch> toggle a highlight
outside                     clear the selection
backspace                   delete rows behind the selection
add | reset | show | help | quit";

enum ShellStep {
    Redraw(Outcome),
    Show,
    Help,
    Quit,
}

fn shell_event<S: KeyValueStore, P: InputPrompt>(
    ctl: &mut Controller<S, P>,
    command: &str,
    args: &[&str],
) -> anyhow::Result<ShellStep> {
    let step = match (command, args) {
        ("click", [row, cell]) | ("ctrl", [row, cell]) => {
            let target = resolve_target(&ctl.grid(), row, cell)?;
            ShellStep::Redraw(ctl.click(target, command == "ctrl"))
        }
        ("swatch", [row, day, swatch]) => {
            let id = resolve_row(&ctl.grid(), row)?;
            let day = parse_day(day)?;
            let swatch =
                resolve_swatch(swatch).ok_or_else(|| anyhow!("unknown swatch: {swatch}"))?;
            ShellStep::Redraw(ctl.swatch(id, day, swatch.color))
        }
        ("outside", []) => ShellStep::Redraw(ctl.click_outside()),
        ("backspace", []) => ShellStep::Redraw(ctl.backspace()),
        ("add", []) => {
            ctl.add_row();
            ShellStep::Redraw(Outcome::Structural)
        }
        ("reset", []) => ShellStep::Redraw(ctl.reset()),
        ("show", []) => ShellStep::Show,
        ("help", _) => ShellStep::Help,
        ("quit", _) | ("exit", _) => ShellStep::Quit,
        _ => bail!("unrecognized input: {command} {}; try help", args.join(" ")),
    };
    Ok(step)
}

fn resolve_target(grid: &Grid, row: &str, cell: &str) -> anyhow::Result<CellRef> {
    let id = resolve_row(grid, row)?;
    if cell.eq_ignore_ascii_case("time") || cell.eq_ignore_ascii_case("t") {
        return Ok(CellRef::Time(id));
    }
    Ok(CellRef::Task(id, parse_day(cell)?))
}

/// Maps a 1-based row number, as shown in the grid, to the row's identity.
pub fn resolve_row(grid: &Grid, token: &str) -> anyhow::Result<RowId> {
    let position = token
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid row number: {token}"))?;
    grid.row_at(position)
        .map(|row| row.id.clone())
        .ok_or_else(|| anyhow!("no row {position}; the grid has {} rows", grid.rows.len()))
}

/// `0`-`6` counting from Sunday, or a weekday name.
pub fn parse_day(token: &str) -> anyhow::Result<Weekday> {
    let token = token.trim();
    if let Ok(number) = token.parse::<usize>() {
        return WEEK
            .get(number)
            .copied()
            .ok_or_else(|| anyhow!("day must be 0-6, got {number}"));
    }
    token
        .parse::<Weekday>()
        .map_err(|_| anyhow!("unknown day: {token}"))
}

fn settle(outcome: Outcome) -> anyhow::Result<Outcome> {
    match outcome {
        Outcome::Rejected(message) => Err(anyhow!(message)),
        other => Ok(other),
    }
}

fn swatch_list() -> String {
    SWATCHES
        .iter()
        .enumerate()
        .map(|(idx, swatch)| format!("{} {}", idx + 1, swatch.name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::Weekday;

    use super::{dispatch, expand_command_abbrev, known_command_names, parse_day, run_shell};
    use crate::cli::Invocation;
    use crate::config::Config;
    use crate::controller::Controller;
    use crate::prompt::TerminalPrompt;
    use crate::render::Renderer;
    use crate::schedule::{Schedule, SlotRange};
    use crate::storage::MemoryStore;

    fn invoke(command: &str, args: &[&str]) -> Invocation {
        Invocation {
            command: command.to_string(),
            command_args: args.iter().map(ToString::to_string).collect(),
        }
    }

    fn reopen(store: MemoryStore) -> Schedule<MemoryStore> {
        Schedule::open(store, SlotRange::default())
    }

    #[test]
    fn days_parse_by_number_or_name() {
        assert_eq!(parse_day("0").expect("day"), Weekday::Sun);
        assert_eq!(parse_day("Wed").expect("day"), Weekday::Wed);
        assert_eq!(parse_day("saturday").expect("day"), Weekday::Sat);
        assert!(parse_day("7").is_err());
        assert!(parse_day("someday").is_err());
    }

    #[test]
    fn ambiguous_abbreviation_is_rejected() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("sh", &known), None);
        assert_eq!(expand_command_abbrev("sho", &known), Some("show"));
        assert_eq!(expand_command_abbrev("e", &known), None);
        assert_eq!(expand_command_abbrev("ex", &known), Some("export"));
    }

    #[test]
    fn malformed_arguments_are_errors() {
        let cfg = Config::default();
        let cases = [
            invoke("time", &["1"]),
            invoke("time", &["99", "10:00"]),
            invoke("time", &["1", "25:61"]),
            invoke("edit", &["1", "funday", "Gym"]),
            invoke("color", &["1", "mon", "orange"]),
            invoke("delete", &[]),
            invoke("export", &["png"]),
        ];
        for inv in cases {
            let schedule = reopen(MemoryStore::new());
            assert!(
                dispatch(schedule, &cfg, &mut Renderer::plain(), inv.clone()).is_err(),
                "{inv:?} should fail"
            );
        }
    }

    #[test]
    fn shell_drives_selection_and_bulk_edit() {
        let script = "\
ctrl 1 mon
ctrl 2 tue
click 2 tue
Gym
swatch 1 mon yellow
outside
bogus
quit
";
        let schedule = reopen(MemoryStore::new());
        let prompt = TerminalPrompt::new(Cursor::new(script), Vec::new());
        let mut ctl = Controller::new(schedule, prompt);

        run_shell(&mut ctl, &mut Renderer::plain()).expect("shell");

        let data = ctl.schedule().data();
        assert_eq!(data.get("1-05:00").map(|c| c.task.as_str()), Some("Gym"));
        assert_eq!(data.get("2-06:00").map(|c| c.task.as_str()), Some("Gym"));
        assert_eq!(data.get("1-06:00").map(|c| c.color.as_str()), None);
        assert!(data.get("2-06:00").is_some_and(|c| !c.color.is_empty()));
        assert!(
            data.get("1-05:00")
                .is_some_and(|c| c.color.replace(' ', "") == "rgb(255,249,196)")
        );
        assert!(ctl.selection().is_empty());

        let shown = String::from_utf8(ctl.prompt_mut().output().clone()).expect("utf8");
        assert!(shown.contains("unrecognized input: bogus"));
    }
}
