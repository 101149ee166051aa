use std::collections::BTreeMap;

use chrono::Weekday;
use serde::Serialize;

use crate::schedule::{CellData, Row, RowId, WEEK, day_label};

/// Label shown in the time column of a row without a time.
pub const UNSET_TIME_LABEL: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub day: Weekday,
    pub key: String,
    pub task: String,
    /// Highlight color, `None` when the cell is uncolored.
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridRow {
    #[serde(skip)]
    pub id: RowId,
    pub time: String,
    pub cells: Vec<GridCell>,
}

impl GridRow {
    pub fn label(&self) -> &str {
        if self.time.is_empty() {
            UNSET_TIME_LABEL
        } else {
            &self.time
        }
    }

    pub fn cell(&self, day: Weekday) -> Option<&GridCell> {
        self.cells.iter().find(|cell| cell.day == day)
    }
}

/// A fully materialized view of the schedule, rebuilt from scratch on every
/// structural change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Grid {
    pub rows: Vec<GridRow>,
}

impl Grid {
    pub fn day_headers() -> Vec<&'static str> {
        WEEK.iter().map(|day| day_label(*day)).collect()
    }

    pub fn row(&self, id: &RowId) -> Option<&GridRow> {
        self.rows.iter().find(|row| &row.id == id)
    }

    /// 1-based display position of a row.
    pub fn position(&self, id: &RowId) -> Option<usize> {
        self.rows.iter().position(|row| &row.id == id).map(|idx| idx + 1)
    }

    /// Row at a 1-based display position.
    pub fn row_at(&self, position: usize) -> Option<&GridRow> {
        position.checked_sub(1).and_then(|idx| self.rows.get(idx))
    }
}

pub fn render(rows: &[Row], data: &BTreeMap<String, CellData>) -> Grid {
    let rows = rows
        .iter()
        .map(|row| {
            let cells = WEEK
                .iter()
                .map(|day| {
                    let key = row.cell_key(*day);
                    let stored = data.get(&key);
                    GridCell {
                        day: *day,
                        task: stored.map(|cell| cell.task.clone()).unwrap_or_default(),
                        color: stored
                            .map(|cell| cell.color.clone())
                            .filter(|color| !color.is_empty()),
                        key,
                    }
                })
                .collect();

            GridRow {
                id: row.id.clone(),
                time: row.time.clone(),
                cells,
            }
        })
        .collect();

    Grid { rows }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Weekday;

    use super::{UNSET_TIME_LABEL, render};
    use crate::schedule::{CellData, Row, RowId};

    #[test]
    fn resolves_cells_by_derived_key() {
        let rows = vec![
            Row {
                id: RowId::Custom("42".to_string()),
                time: String::new(),
            },
            Row {
                id: RowId::Default(0),
                time: "05:00".to_string(),
            },
        ];
        let mut data = BTreeMap::new();
        data.insert(
            "1-05:00".to_string(),
            CellData {
                task: "Stretch".to_string(),
                color: "rgb(187, 222, 251)".to_string(),
            },
        );
        data.insert(
            "6-custom-42-".to_string(),
            CellData {
                task: "Plan".to_string(),
                color: String::new(),
            },
        );

        let grid = render(&rows, &data);

        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.position(&RowId::Default(0)), Some(2));
        assert_eq!(grid.position(&RowId::Custom("7".to_string())), None);
        assert_eq!(grid.rows[0].label(), UNSET_TIME_LABEL);
        let plan = grid.rows[0].cell(Weekday::Sat).expect("saturday cell");
        assert_eq!(plan.task, "Plan");
        assert_eq!(plan.color, None);

        let stretch = grid.rows[1].cell(Weekday::Mon).expect("monday cell");
        assert_eq!(stretch.task, "Stretch");
        assert_eq!(stretch.color.as_deref(), Some("rgb(187, 222, 251)"));
        assert_eq!(grid.rows[1].cell(Weekday::Sun).map(|c| c.task.as_str()), Some(""));
    }
}
