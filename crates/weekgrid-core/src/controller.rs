use chrono::Weekday;
use tracing::{debug, info, instrument, warn};

use crate::grid::{self, Grid, UNSET_TIME_LABEL};
use crate::prompt::InputPrompt;
use crate::schedule::{RowId, Schedule, day_label};
use crate::storage::KeyValueStore;

/// Something a user can point at: a row's time label or one of its task
/// cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellRef {
    Time(RowId),
    Task(RowId, Weekday),
}

impl CellRef {
    pub fn row(&self) -> &RowId {
        match self {
            CellRef::Time(id) | CellRef::Task(id, _) => id,
        }
    }
}

/// What an event did, so front ends know whether to redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    /// Only the selection changed.
    Selection,
    /// Cell contents changed; rows and their order did not.
    Edited,
    /// Rows were added, removed, renamed or reset.
    Structural,
    Cancelled,
    Rejected(String),
}

pub const RESET_CONFIRMATION: &str =
    "Reset the whole table? Every task, color and custom row will be lost.";

/// Interprets pointer and keyboard events against a `Schedule`.
///
/// The selection holds row identities, never positions on screen, and is
/// dropped whenever rows are deleted or the table is reset.
pub struct Controller<S: KeyValueStore, P: InputPrompt> {
    schedule: Schedule<S>,
    prompt: P,
    selection: Vec<CellRef>,
}

impl<S: KeyValueStore, P: InputPrompt> Controller<S, P> {
    pub fn new(schedule: Schedule<S>, prompt: P) -> Self {
        Self {
            schedule,
            prompt,
            selection: Vec::new(),
        }
    }

    pub fn schedule(&self) -> &Schedule<S> {
        &self.schedule
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    pub fn prompt_mut(&mut self) -> &mut P {
        &mut self.prompt
    }

    pub fn selection(&self) -> &[CellRef] {
        &self.selection
    }

    pub fn is_selected(&self, target: &CellRef) -> bool {
        self.selection.contains(target)
    }

    /// The current rendered surface.
    pub fn grid(&self) -> Grid {
        grid::render(&self.schedule.list_rows(), self.schedule.data())
    }

    #[instrument(skip(self))]
    pub fn click(&mut self, target: CellRef, modifier: bool) -> Outcome {
        if modifier {
            return self.toggle_selected(target);
        }

        match target {
            CellRef::Time(id) => self.edit_time(&id),
            CellRef::Task(id, day) => {
                let clicked = CellRef::Task(id.clone(), day);
                if self.is_selected(&clicked) && self.selection.len() > 1 {
                    self.edit_selected_tasks(&id, day)
                } else {
                    self.selection.clear();
                    self.edit_task(&id, day)
                }
            }
        }
    }

    /// Toggles `color` on the target cell, or on every selected task cell
    /// when the target is part of a multi-cell selection. Each cell is
    /// compared against its own current color.
    #[instrument(skip(self))]
    pub fn swatch(&mut self, id: RowId, day: Weekday, color: &str) -> Outcome {
        let target = CellRef::Task(id.clone(), day);
        let targets: Vec<(RowId, Weekday)> =
            if self.is_selected(&target) && self.selection.len() > 1 {
                self.selected_task_cells()
            } else {
                vec![(id, day)]
            };

        let mut changed = 0_usize;
        for (row, day) in targets {
            match self.schedule.toggle_color(&row, day, color) {
                Ok(_) => changed += 1,
                Err(err) => warn!(error = %err, "skipping color toggle"),
            }
        }

        if changed == 0 {
            return self.reject("that cell no longer exists".to_string());
        }
        Outcome::Edited
    }

    pub fn click_outside(&mut self) -> Outcome {
        if self.selection.is_empty() {
            return Outcome::Unchanged;
        }
        self.selection.clear();
        debug!("cleared selection");
        Outcome::Selection
    }

    /// Deletes every row touched by the selection.
    #[instrument(skip(self))]
    pub fn backspace(&mut self) -> Outcome {
        if self.selection.is_empty() {
            return Outcome::Unchanged;
        }
        let rows: Vec<RowId> = self
            .selection
            .drain(..)
            .map(|target| target.row().clone())
            .collect();
        let removed = self.schedule.delete_rows(rows);
        info!(removed, "deleted selected rows");
        Outcome::Structural
    }

    pub fn add_row(&mut self) -> RowId {
        self.schedule.add_custom_row()
    }

    #[instrument(skip(self))]
    pub fn reset(&mut self) -> Outcome {
        if !self.prompt.confirm(RESET_CONFIRMATION) {
            debug!("reset declined");
            return Outcome::Cancelled;
        }
        self.selection.clear();
        self.schedule.reset();
        Outcome::Structural
    }

    fn toggle_selected(&mut self, target: CellRef) -> Outcome {
        if let Some(pos) = self.selection.iter().position(|c| c == &target) {
            self.selection.remove(pos);
        } else {
            self.selection.push(target);
        }
        debug!(selected = self.selection.len(), "selection toggled");
        Outcome::Selection
    }

    fn selected_task_cells(&self) -> Vec<(RowId, Weekday)> {
        self.selection
            .iter()
            .filter_map(|target| match target {
                CellRef::Task(id, day) => Some((id.clone(), *day)),
                CellRef::Time(_) => None,
            })
            .collect()
    }

    fn edit_time(&mut self, id: &RowId) -> Outcome {
        let Some(row) = self.schedule.row(id) else {
            return self.reject(format!("unknown row {id}"));
        };
        let shown = if row.time.is_empty() {
            UNSET_TIME_LABEL
        } else {
            row.time.as_str()
        };
        let message = format!("New time for {shown} (HH:MM):");

        let answer = self.prompt.request_text(&message, &row.time);
        let Some(text) = answer.filter(|text| !text.is_empty()) else {
            return Outcome::Cancelled;
        };

        match self.schedule.rename_row(id, &text) {
            Ok(_) => Outcome::Structural,
            Err(err) => self.reject(err.to_string()),
        }
    }

    fn edit_task(&mut self, id: &RowId, day: Weekday) -> Outcome {
        let Some(task) = self.ask_task(id, day) else {
            return Outcome::Cancelled;
        };
        match self.schedule.set_task(id, day, &task) {
            Ok(()) => Outcome::Edited,
            Err(err) => self.reject(err.to_string()),
        }
    }

    fn edit_selected_tasks(&mut self, id: &RowId, day: Weekday) -> Outcome {
        let Some(task) = self.ask_task(id, day) else {
            return Outcome::Cancelled;
        };
        for (row, day) in self.selected_task_cells() {
            if let Err(err) = self.schedule.set_task(&row, day, &task) {
                warn!(error = %err, "skipping bulk task edit");
            }
        }
        Outcome::Edited
    }

    fn ask_task(&mut self, id: &RowId, day: Weekday) -> Option<String> {
        let row = self.schedule.row(id)?;
        let current = self
            .schedule
            .cell(id, day)
            .map(|cell| cell.task.clone())
            .unwrap_or_default();
        let shown = if row.time.is_empty() {
            UNSET_TIME_LABEL
        } else {
            row.time.as_str()
        };
        let message = format!("Task for {shown} ({}):", day_label(day));
        self.prompt.request_text(&message, &current)
    }

    fn reject(&mut self, message: String) -> Outcome {
        self.prompt.alert(&message);
        Outcome::Rejected(message)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::{CellRef, Controller, Outcome};
    use crate::prompt::ScriptedPrompt;
    use crate::schedule::{RowId, Schedule, SlotRange};
    use crate::storage::MemoryStore;

    const YELLOW: &str = "rgb(255,249,196)";

    fn controller(prompt: ScriptedPrompt) -> Controller<MemoryStore, ScriptedPrompt> {
        Controller::new(Schedule::open(MemoryStore::new(), SlotRange::default()), prompt)
    }

    fn task(index: usize, day: Weekday) -> CellRef {
        CellRef::Task(RowId::Default(index), day)
    }

    #[test]
    fn modifier_clicks_toggle_membership() {
        let mut ctl = controller(ScriptedPrompt::new());
        assert_eq!(ctl.click(task(0, Weekday::Mon), true), Outcome::Selection);
        assert_eq!(ctl.click(task(1, Weekday::Mon), true), Outcome::Selection);
        assert_eq!(ctl.selection().len(), 2);

        ctl.click(task(0, Weekday::Mon), true);
        assert_eq!(ctl.selection(), &[task(1, Weekday::Mon)]);
        ctl.click(task(1, Weekday::Mon), true);
        assert!(ctl.selection().is_empty());
        assert!(ctl.prompt().asked.is_empty());
    }

    #[test]
    fn plain_click_on_selected_cell_edits_every_selected_cell() {
        let mut ctl = controller(ScriptedPrompt::new().answer("Gym"));
        ctl.click(task(0, Weekday::Mon), true);
        ctl.click(task(2, Weekday::Wed), true);
        ctl.click(CellRef::Time(RowId::Default(5)), true);

        assert_eq!(ctl.click(task(2, Weekday::Wed), false), Outcome::Edited);

        let schedule = ctl.schedule();
        assert_eq!(schedule.data().get("1-05:00").map(|c| c.task.as_str()), Some("Gym"));
        assert_eq!(schedule.data().get("3-07:00").map(|c| c.task.as_str()), Some("Gym"));
        assert_eq!(schedule.data().len(), 2);
        assert_eq!(ctl.selection().len(), 3);
    }

    #[test]
    fn plain_click_with_single_selection_edits_only_clicked_cell() {
        let mut ctl = controller(ScriptedPrompt::new().answer("Read"));
        ctl.click(task(0, Weekday::Mon), true);

        assert_eq!(ctl.click(task(1, Weekday::Tue), false), Outcome::Edited);

        assert!(ctl.selection().is_empty());
        assert_eq!(ctl.schedule().data().len(), 1);
        assert_eq!(ctl.schedule().data().get("2-06:00").map(|c| c.task.as_str()), Some("Read"));
    }

    #[test]
    fn empty_answer_is_stored_and_dismissal_is_not() {
        let mut ctl = controller(ScriptedPrompt::new().answer("Gym").answer("").dismiss());
        ctl.click(task(0, Weekday::Sun), false);
        assert_eq!(ctl.click(task(0, Weekday::Sun), false), Outcome::Edited);
        assert_eq!(ctl.schedule().data().get("0-05:00").map(|c| c.task.as_str()), Some(""));

        assert_eq!(ctl.click(task(0, Weekday::Sun), false), Outcome::Cancelled);
        assert_eq!(ctl.schedule().data().get("0-05:00").map(|c| c.task.as_str()), Some(""));
    }

    #[test]
    fn bulk_swatch_compares_each_cell_independently() {
        let mut ctl = controller(ScriptedPrompt::new());
        ctl.swatch(RowId::Default(0), Weekday::Mon, "rgb(255, 249, 196)");
        ctl.click(task(0, Weekday::Mon), true);
        ctl.click(task(1, Weekday::Mon), true);

        assert_eq!(ctl.swatch(RowId::Default(1), Weekday::Mon, YELLOW), Outcome::Edited);

        let data = ctl.schedule().data();
        assert_eq!(data.get("1-05:00").map(|c| c.color.as_str()), Some(""));
        assert_eq!(data.get("1-06:00").map(|c| c.color.as_str()), Some(YELLOW));
    }

    #[test]
    fn swatch_on_unselected_cell_ignores_selection() {
        let mut ctl = controller(ScriptedPrompt::new());
        ctl.click(task(0, Weekday::Mon), true);
        ctl.click(task(1, Weekday::Mon), true);

        ctl.swatch(RowId::Default(3), Weekday::Fri, YELLOW);

        assert_eq!(ctl.schedule().data().len(), 1);
        assert_eq!(ctl.selection().len(), 2);
    }

    #[test]
    fn time_click_renames_and_rejects_bad_input() {
        let mut ctl = controller(
            ScriptedPrompt::new()
                .answer("Gym")
                .answer("25:61")
                .answer("9:15"),
        );
        ctl.click(task(4, Weekday::Tue), false);

        let outcome = ctl.click(CellRef::Time(RowId::Default(4)), false);
        assert!(matches!(outcome, Outcome::Rejected(_)));
        assert_eq!(ctl.prompt().alerts.len(), 1);
        assert_eq!(ctl.schedule().time_slots()[4], "09:00");

        assert_eq!(ctl.click(CellRef::Time(RowId::Default(4)), false), Outcome::Structural);
        assert_eq!(ctl.schedule().time_slots()[4], "09:15");
        assert_eq!(ctl.schedule().data().get("2-09:15").map(|c| c.task.as_str()), Some("Gym"));
        assert!(!ctl.schedule().data().contains_key("2-09:00"));
    }

    #[test]
    fn empty_time_answer_is_a_no_op() {
        let mut ctl = controller(ScriptedPrompt::new().answer(""));
        let outcome = ctl.click(CellRef::Time(RowId::Default(0)), false);
        assert_eq!(outcome, Outcome::Cancelled);
        assert!(ctl.prompt().alerts.is_empty());
    }

    #[test]
    fn backspace_deletes_rows_behind_selection() {
        let mut ctl = controller(ScriptedPrompt::new().answer("Gym"));
        let custom = ctl.add_row();
        ctl.click(CellRef::Task(custom.clone(), Weekday::Sat), false);
        ctl.click(CellRef::Task(custom.clone(), Weekday::Sat), true);
        ctl.click(CellRef::Time(RowId::Default(0)), true);
        ctl.click(task(0, Weekday::Thu), true);

        assert_eq!(ctl.backspace(), Outcome::Structural);

        assert!(ctl.selection().is_empty());
        assert!(ctl.schedule().custom_rows().is_empty());
        assert!(ctl.schedule().data().is_empty());
        assert_eq!(ctl.schedule().time_slots().first().map(String::as_str), Some("06:00"));
        assert_eq!(ctl.backspace(), Outcome::Unchanged);
    }

    #[test]
    fn outside_click_clears_selection() {
        let mut ctl = controller(ScriptedPrompt::new());
        assert_eq!(ctl.click_outside(), Outcome::Unchanged);
        ctl.click(task(0, Weekday::Mon), true);
        assert_eq!(ctl.click_outside(), Outcome::Selection);
        assert!(ctl.selection().is_empty());
    }

    #[test]
    fn reset_requires_confirmation() {
        let mut ctl = controller(ScriptedPrompt::new().confirm_with(false).confirm_with(true));
        ctl.add_row();

        assert_eq!(ctl.reset(), Outcome::Cancelled);
        assert_eq!(ctl.schedule().custom_rows().len(), 1);

        assert_eq!(ctl.reset(), Outcome::Structural);
        assert!(ctl.schedule().custom_rows().is_empty());
    }

    #[test]
    fn new_row_renders_first() {
        let mut ctl = controller(ScriptedPrompt::new());
        let id = ctl.add_row();
        let grid = ctl.grid();
        assert_eq!(grid.rows[0].id, id);
        assert_eq!(grid.rows[0].label(), "--");
        assert_eq!(grid.rows.len(), 20);
    }
}
