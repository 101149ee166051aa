use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::{anyhow, bail};
use chrono::{Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::storage::{self, Collection, KeyValueStore};
use crate::time::{hourly_slots, parse_time, to_minutes};

/// Grid columns, Sunday first. A day's position here is the number used in
/// cell keys.
pub const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

pub fn day_number(day: Weekday) -> u32 {
    day.num_days_from_sunday()
}

pub fn day_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

/// Identity of a row, independent of any rendering surface.
///
/// `Default` carries a position in the time-slot list and is only valid until
/// the next deletion or reset. `Custom` carries the generated id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowId {
    Default(usize),
    Custom(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Default(index) => write!(f, "default#{index}"),
            RowId::Custom(id) => write!(f, "custom#{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: RowId,
    /// Canonical `HH:MM`, or empty when a custom row has no time yet.
    pub time: String,
}

impl Row {
    pub fn cell_key(&self, day: Weekday) -> String {
        cell_key(&self.id, &self.time, day)
    }
}

/// Storage address of the cell at (`id`, `day`) while the row shows `time`.
pub fn cell_key(id: &RowId, time: &str, day: Weekday) -> String {
    let day = day_number(day);
    match id {
        RowId::Default(_) => format!("{day}-{time}"),
        RowId::Custom(custom) => format!("{day}-custom-{custom}-{time}"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellData {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRow {
    pub id: String,
    #[serde(default)]
    pub time: String,
}

/// Inclusive hour range used to seed default rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u32,
    pub end: u32,
}

impl Default for SlotRange {
    fn default() -> Self {
        Self { start: 5, end: 23 }
    }
}

impl SlotRange {
    pub fn generate(&self) -> Vec<String> {
        hourly_slots(self.start, self.end)
    }
}

/// Colors compare equal when they differ only in ASCII whitespace or case.
pub fn same_color(a: &str, b: &str) -> bool {
    let normalize = |s: &str| {
        s.chars()
            .filter(|ch| !ch.is_ascii_whitespace())
            .map(|ch| ch.to_ascii_lowercase())
            .collect::<String>()
    };
    normalize(a) == normalize(b)
}

/// Owner of the three persisted collections. Every mutation writes the
/// collections it touched before returning.
#[derive(Debug)]
pub struct Schedule<S: KeyValueStore> {
    store: S,
    slots: SlotRange,
    data: BTreeMap<String, CellData>,
    time_slots: Vec<String>,
    custom_rows: Vec<CustomRow>,
    last_custom_id: i64,
}

impl<S: KeyValueStore> Schedule<S> {
    #[instrument(skip(store))]
    pub fn open(store: S, slots: SlotRange) -> Self {
        let data: BTreeMap<String, CellData> = storage::load(&store, Collection::ScheduleData);
        let time_slots: Vec<String> = storage::load(&store, Collection::TimeSlots);
        let custom_rows: Vec<CustomRow> = storage::load(&store, Collection::CustomRows);

        let mut schedule = Self {
            store,
            slots,
            data,
            time_slots,
            custom_rows,
            last_custom_id: 0,
        };

        if schedule.time_slots.is_empty() {
            schedule.time_slots = slots.generate();
            info!(count = schedule.time_slots.len(), "seeded default time slots");
            schedule.persist(Collection::TimeSlots);
        }

        debug!(
            cells = schedule.data.len(),
            slots = schedule.time_slots.len(),
            custom = schedule.custom_rows.len(),
            "loaded schedule"
        );
        schedule
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn data(&self) -> &BTreeMap<String, CellData> {
        &self.data
    }

    pub fn time_slots(&self) -> &[String] {
        &self.time_slots
    }

    pub fn custom_rows(&self) -> &[CustomRow] {
        &self.custom_rows
    }

    /// Default rows then custom rows, stable-sorted by minute of day with
    /// unset times first.
    pub fn list_rows(&self) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .time_slots
            .iter()
            .enumerate()
            .map(|(index, time)| Row {
                id: RowId::Default(index),
                time: time.clone(),
            })
            .chain(self.custom_rows.iter().map(|row| Row {
                id: RowId::Custom(row.id.clone()),
                time: row.time.clone(),
            }))
            .collect();

        rows.sort_by_key(|row| to_minutes(&row.time));
        rows
    }

    pub fn row(&self, id: &RowId) -> Option<Row> {
        let time = match id {
            RowId::Default(index) => self.time_slots.get(*index)?.clone(),
            RowId::Custom(custom) => self
                .custom_rows
                .iter()
                .find(|row| &row.id == custom)?
                .time
                .clone(),
        };
        Some(Row {
            id: id.clone(),
            time,
        })
    }

    pub fn cell_key(&self, id: &RowId, day: Weekday) -> Option<String> {
        self.row(id).map(|row| row.cell_key(day))
    }

    pub fn cell(&self, id: &RowId, day: Weekday) -> Option<&CellData> {
        let key = self.cell_key(id, day)?;
        self.data.get(&key)
    }

    /// Gives a row a new time and carries its cells over to the new keys.
    ///
    /// Returns the canonical time. Invalid text or an unknown row leaves
    /// every collection untouched.
    #[instrument(skip(self), fields(row = %id))]
    pub fn rename_row(&mut self, id: &RowId, text: &str) -> anyhow::Result<String> {
        let parsed = parse_time(text)
            .ok_or_else(|| anyhow!("invalid time {text:?}; use HH:MM (e.g. 05:15)"))?;
        let row = self
            .row(id)
            .ok_or_else(|| anyhow!("unknown row {id}"))?;
        let new_time = parsed.canonical();

        match id {
            RowId::Default(index) => {
                self.time_slots[*index] = new_time.clone();
                self.persist(Collection::TimeSlots);
            }
            RowId::Custom(custom) => {
                if let Some(entry) = self.custom_rows.iter_mut().find(|r| &r.id == custom) {
                    entry.time = new_time.clone();
                }
                self.persist(Collection::CustomRows);
            }
        }

        let mut moved = 0_usize;
        for day in WEEK {
            let old_key = cell_key(id, &row.time, day);
            let new_key = cell_key(id, &new_time, day);
            if old_key == new_key {
                continue;
            }
            if let Some(cell) = self.data.remove(&old_key) {
                debug!(from = %old_key, to = %new_key, "migrating cell");
                self.data.insert(new_key, cell);
                moved += 1;
            }
        }
        self.persist(Collection::ScheduleData);

        info!(old = %row.time, new = %new_time, moved, "renamed row");
        Ok(new_time)
    }

    /// Appends a custom row with no time; it sorts to the top until timed.
    #[instrument(skip(self))]
    pub fn add_custom_row(&mut self) -> RowId {
        let mut candidate = Utc::now().timestamp_millis().max(self.last_custom_id + 1);
        while self
            .custom_rows
            .iter()
            .any(|row| row.id == candidate.to_string())
        {
            candidate += 1;
        }
        self.last_custom_id = candidate;

        let id = candidate.to_string();
        self.custom_rows.push(CustomRow {
            id: id.clone(),
            time: String::new(),
        });
        self.persist(Collection::CustomRows);

        info!(id = %id, "added custom row");
        RowId::Custom(id)
    }

    /// Removes rows along with the cells of all seven days. Returns how many
    /// rows were actually removed.
    #[instrument(skip(self, ids))]
    pub fn delete_rows<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = RowId>,
    {
        let ids: BTreeSet<RowId> = ids.into_iter().collect();
        let mut default_indices = Vec::new();
        let mut custom_ids = BTreeSet::new();

        for id in &ids {
            let Some(row) = self.row(id) else {
                warn!(row = %id, "skipping unknown row on delete");
                continue;
            };
            for day in WEEK {
                self.data.remove(&row.cell_key(day));
            }
            match id {
                RowId::Default(index) => default_indices.push(*index),
                RowId::Custom(custom) => {
                    custom_ids.insert(custom.clone());
                }
            }
        }

        // Highest index first so each removal leaves the rest in place.
        default_indices.sort_unstable_by(|a, b| b.cmp(a));
        for index in &default_indices {
            self.time_slots.remove(*index);
        }
        self.custom_rows.retain(|row| !custom_ids.contains(&row.id));

        if !default_indices.is_empty() {
            self.persist(Collection::TimeSlots);
        }
        if !custom_ids.is_empty() {
            self.persist(Collection::CustomRows);
        }
        self.persist(Collection::ScheduleData);

        let removed = default_indices.len() + custom_ids.len();
        info!(removed, "deleted rows");
        removed
    }

    #[instrument(skip(self, task), fields(row = %id))]
    pub fn set_task(&mut self, id: &RowId, day: Weekday, task: &str) -> anyhow::Result<()> {
        let Some(key) = self.cell_key(id, day) else {
            bail!("unknown row {id}");
        };
        self.data.entry(key).or_default().task = task.to_string();
        self.persist(Collection::ScheduleData);
        Ok(())
    }

    /// Clears the cell's color when it already shows `color`, sets it
    /// otherwise. Returns the color the cell ends up with.
    #[instrument(skip(self), fields(row = %id))]
    pub fn toggle_color(&mut self, id: &RowId, day: Weekday, color: &str) -> anyhow::Result<String> {
        let Some(key) = self.cell_key(id, day) else {
            bail!("unknown row {id}");
        };
        let cell = self.data.entry(key).or_default();
        if same_color(&cell.color, color) {
            cell.color.clear();
        } else {
            cell.color = color.to_string();
        }
        let result = cell.color.clone();
        self.persist(Collection::ScheduleData);
        Ok(result)
    }

    /// Drops every collection and re-seeds the default hourly slots.
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        for collection in Collection::ALL {
            storage::clear(&mut self.store, collection);
        }
        self.data.clear();
        self.custom_rows.clear();
        self.time_slots = self.slots.generate();
        self.persist(Collection::TimeSlots);
        info!(slots = self.time_slots.len(), "reset schedule");
    }

    fn persist(&mut self, collection: Collection) {
        match collection {
            Collection::ScheduleData => storage::save(&mut self.store, collection, &self.data),
            Collection::TimeSlots => storage::save(&mut self.store, collection, &self.time_slots),
            Collection::CustomRows => storage::save(&mut self.store, collection, &self.custom_rows),
        }
    }
}
