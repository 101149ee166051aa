use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::controller::CellRef;
use crate::grid::{Grid, GridCell, GridRow};
use crate::palette::{parse_rgb, swatch_name};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, grid, selection))]
    pub fn print_grid(&mut self, grid: &Grid, selection: &[CellRef]) -> anyhow::Result<()> {
        let paint = self.color && io::stdout().is_terminal();
        let mut out = io::stdout().lock();
        write_grid(&mut out, grid, selection, paint)
    }
}

/// Draws the grid as an aligned table: position, time, then one column per
/// day. Selected cells are prefixed with `*`. With `paint` off, highlight
/// colors are spelled out after the task text instead.
pub fn write_grid<W: Write>(
    writer: W,
    grid: &Grid,
    selection: &[CellRef],
    paint: bool,
) -> anyhow::Result<()> {
    let mut headers = vec!["#".to_string(), "Time".to_string()];
    headers.extend(Grid::day_headers().into_iter().map(str::to_string));

    let rows = grid
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut line = Vec::with_capacity(9);
            line.push((idx + 1).to_string());

            let time_ref = CellRef::Time(row.id.clone());
            line.push(mark(row.label(), selection.contains(&time_ref)));

            for cell in &row.cells {
                line.push(cell_text(row, cell, selection, paint));
            }
            line
        })
        .collect();

    write_table(writer, headers, rows)
}

fn cell_text(row: &GridRow, cell: &GridCell, selection: &[CellRef], paint: bool) -> String {
    let task: String = cell
        .task
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect();
    let selected = selection.contains(&CellRef::Task(row.id.clone(), cell.day));

    let Some(color) = cell.color.as_deref() else {
        return mark(&task, selected);
    };

    if paint && let Some((r, g, b)) = parse_rgb(color) {
        let body = if task.is_empty() { " ".to_string() } else { task };
        return mark(
            &format!("\x1b[48;2;{r};{g};{b}m\x1b[30m{body}\x1b[0m"),
            selected,
        );
    }

    let name = swatch_name(color).unwrap_or(color);
    if task.is_empty() {
        mark(&format!("[{name}]"), selected)
    } else {
        mark(&format!("{task} [{name}]"), selected)
    }
}

fn mark(text: &str, selected: bool) -> String {
    if selected {
        format!("*{text}")
    } else {
        text.to_string()
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
