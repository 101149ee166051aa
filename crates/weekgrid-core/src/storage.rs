use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

/// The three independently persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    ScheduleData,
    TimeSlots,
    CustomRows,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::ScheduleData,
        Collection::TimeSlots,
        Collection::CustomRows,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Collection::ScheduleData => "scheduleData",
            Collection::TimeSlots => "timeSlots",
            Collection::CustomRows => "customRows",
        }
    }
}

/// String-keyed durable storage. Values are whole serialized documents.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

/// One `<key>.json` file per entry inside a data directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(raw))
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.entry_path(key);
        debug!(file = %path.display(), bytes = value.len(), "writing entry atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed removing {}", path.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Loads a collection, falling back to `T::default()` when the entry is
/// missing, unreadable or not valid JSON for `T`.
pub fn load<T, S>(store: &S, collection: Collection) -> T
where
    T: DeserializeOwned + Default,
    S: KeyValueStore + ?Sized,
{
    let key = collection.key();
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "collection absent; using default");
            return T::default();
        }
        Err(err) => {
            error!(key, error = %err, "failed reading collection");
            return T::default();
        }
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => value,
        Err(err) => {
            error!(key, error = %err, "failed parsing collection; using default");
            T::default()
        }
    }
}

/// Overwrites a collection. Failures are logged and dropped: there is no
/// other durability path to fall back on.
pub fn save<T, S>(store: &mut S, collection: Collection, value: &T)
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let key = collection.key();
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(err) => {
            warn!(key, error = %err, "failed serializing collection");
            return;
        }
    };

    if let Err(err) = store.set(key, &json) {
        warn!(key, error = %err, "failed saving collection; change will not persist");
    }
}

pub fn clear<S>(store: &mut S, collection: Collection)
where
    S: KeyValueStore + ?Sized,
{
    let key = collection.key();
    if let Err(err) = store.remove(key) {
        warn!(key, error = %err, "failed clearing collection");
    }
}

#[cfg(test)]
mod tests {
    use super::{Collection, KeyValueStore, MemoryStore, load, save};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow::anyhow!("storage disabled"))
        }

        fn set(&mut self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("quota exceeded"))
        }

        fn remove(&mut self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("storage disabled"))
        }
    }

    #[test]
    fn corrupt_entry_falls_back_to_default() {
        let mut store = MemoryStore::new();
        store
            .set(Collection::TimeSlots.key(), "{not json")
            .expect("memory set");

        let slots: Vec<String> = load(&store, Collection::TimeSlots);
        assert!(slots.is_empty());
    }

    #[test]
    fn save_overwrites_whole_collection() {
        let mut store = MemoryStore::new();
        save(&mut store, Collection::TimeSlots, &vec!["05:00", "06:00"]);
        save(&mut store, Collection::TimeSlots, &vec!["07:00"]);

        let slots: Vec<String> = load(&store, Collection::TimeSlots);
        assert_eq!(slots, vec!["07:00".to_string()]);
    }

    #[test]
    fn unavailable_store_degrades_silently() {
        let mut store = BrokenStore;
        save(&mut store, Collection::CustomRows, &Vec::<String>::new());
        let rows: Vec<String> = load(&store, Collection::CustomRows);
        assert!(rows.is_empty());
    }
}
