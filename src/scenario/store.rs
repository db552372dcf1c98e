//! Persistence for the scenario collection
//!
//! The engine only needs get/put/delete/list by id, in insertion order, plus
//! the largest id ever stored so deleted ids are never handed out again.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use super::params::{Scenario, ScenarioId};
use crate::error::Result;

/// Key-value collection of scenarios, ordered by insertion
pub trait ScenarioStore {
    fn get(&self, id: ScenarioId) -> Result<Option<Scenario>>;

    /// Insert a new scenario at the end, or replace an existing one in place
    fn put(&mut self, scenario: Scenario) -> Result<()>;

    /// Remove and return the scenario, if present
    fn delete(&mut self, id: ScenarioId) -> Result<Option<Scenario>>;

    fn list(&self) -> Result<Vec<Scenario>>;

    /// Largest id ever stored, deleted scenarios included (0 when none)
    fn high_water_id(&self) -> Result<ScenarioId>;
}

/// Scenarios held in memory for one session
#[derive(Debug, Clone, Default)]
pub struct InMemoryScenarioStore {
    scenarios: Vec<Scenario>,
    high_water_id: ScenarioId,
}

impl InMemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenarios(scenarios: Vec<Scenario>) -> Self {
        let high_water_id = scenarios.iter().map(|s| s.id).max().unwrap_or(0);
        Self {
            scenarios,
            high_water_id,
        }
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl ScenarioStore for InMemoryScenarioStore {
    fn get(&self, id: ScenarioId) -> Result<Option<Scenario>> {
        Ok(self.scenarios.iter().find(|s| s.id == id).cloned())
    }

    fn put(&mut self, scenario: Scenario) -> Result<()> {
        self.high_water_id = self.high_water_id.max(scenario.id);
        match self.scenarios.iter_mut().find(|s| s.id == scenario.id) {
            Some(existing) => *existing = scenario,
            None => self.scenarios.push(scenario),
        }
        Ok(())
    }

    fn delete(&mut self, id: ScenarioId) -> Result<Option<Scenario>> {
        Ok(self
            .scenarios
            .iter()
            .position(|s| s.id == id)
            .map(|idx| self.scenarios.remove(idx)))
    }

    fn list(&self) -> Result<Vec<Scenario>> {
        Ok(self.scenarios.clone())
    }

    fn high_water_id(&self) -> Result<ScenarioId> {
        Ok(self.high_water_id)
    }
}

/// On-disk layout of `JsonFileScenarioStore`
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    high_water_id: ScenarioId,
    scenarios: Vec<Scenario>,
}

/// Older files hold a bare scenario array
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredFile {
    Document(StoreDocument),
    Legacy(Vec<Scenario>),
}

/// Scenarios persisted as a JSON document `{ high_water_id, scenarios }`
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written collection. A failed write
/// leaves the in-memory view unchanged.
#[derive(Debug)]
pub struct JsonFileScenarioStore {
    path: PathBuf,
    cache: InMemoryScenarioStore,
}

impl JsonFileScenarioStore {
    /// Open the store, starting empty if the file does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let stored: StoredFile = serde_json::from_reader(reader)?;
            match stored {
                StoredFile::Document(doc) => {
                    let mut cache = InMemoryScenarioStore::with_scenarios(doc.scenarios);
                    cache.high_water_id = cache.high_water_id.max(doc.high_water_id);
                    cache
                }
                StoredFile::Legacy(scenarios) => InMemoryScenarioStore::with_scenarios(scenarios),
            }
        } else {
            InMemoryScenarioStore::new()
        };
        debug!(
            "Opened scenario store {} ({} scenarios, high-water id {})",
            path.display(),
            cache.len(),
            cache.high_water_id
        );

        Ok(Self { path, cache })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, store: &InMemoryScenarioStore) -> Result<()> {
        let doc = StoreDocument {
            high_water_id: store.high_water_id,
            scenarios: store.scenarios.clone(),
        };
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &doc)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut InMemoryScenarioStore) -> Result<T>,
    {
        let mut next = self.cache.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        self.cache = next;
        Ok(out)
    }
}

impl ScenarioStore for JsonFileScenarioStore {
    fn get(&self, id: ScenarioId) -> Result<Option<Scenario>> {
        self.cache.get(id)
    }

    fn put(&mut self, scenario: Scenario) -> Result<()> {
        self.mutate(|store| store.put(scenario))
    }

    fn delete(&mut self, id: ScenarioId) -> Result<Option<Scenario>> {
        self.mutate(|store| store.delete(id))
    }

    fn list(&self) -> Result<Vec<Scenario>> {
        self.cache.list()
    }

    fn high_water_id(&self) -> Result<ScenarioId> {
        self.cache.high_water_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::params::{evaluate_scenario, reference_parameters};
    use chrono::Utc;

    fn scenario(id: ScenarioId, name: &str) -> Scenario {
        let parameters = reference_parameters();
        let now = Utc::now();
        Scenario {
            id,
            name: name.to_string(),
            description: String::new(),
            parameters,
            result: evaluate_scenario(&parameters).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("appraisal_store_{}_{}.json", tag, std::process::id()))
    }

    #[test]
    fn test_in_memory_insertion_order() {
        let mut store = InMemoryScenarioStore::new();
        store.put(scenario(3, "c")).unwrap();
        store.put(scenario(1, "a")).unwrap();
        store.put(scenario(2, "b")).unwrap();

        // Replacing keeps the original slot
        store.put(scenario(1, "a2")).unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["c", "a2", "b"]);
    }

    #[test]
    fn test_in_memory_delete() {
        let mut store = InMemoryScenarioStore::new();
        store.put(scenario(1, "a")).unwrap();
        assert_eq!(store.delete(1).unwrap().map(|s| s.name), Some("a".to_string()));
        assert!(store.delete(1).unwrap().is_none());
        assert!(store.is_empty());
        assert_eq!(store.high_water_id().unwrap(), 1);
    }

    #[test]
    fn test_json_store_round_trip() {
        let path = temp_path("round_trip");
        let _ = fs::remove_file(&path);

        {
            let mut store = JsonFileScenarioStore::open(&path).unwrap();
            store.put(scenario(1, "summer plan")).unwrap();
            store.put(scenario(2, "winter plan")).unwrap();
            store.delete(1).unwrap();
        }

        let reopened = JsonFileScenarioStore::open(&path).unwrap();
        let all = reopened.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "winter plan");
        assert_eq!(all[0].result, scenario(2, "x").result);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_high_water_survives_delete_and_reopen() {
        let path = temp_path("high_water");
        let _ = fs::remove_file(&path);

        {
            let mut store = JsonFileScenarioStore::open(&path).unwrap();
            store.put(scenario(1, "a")).unwrap();
            store.put(scenario(2, "b")).unwrap();
            store.delete(2).unwrap();
            assert_eq!(store.high_water_id().unwrap(), 2);
        }

        let reopened = JsonFileScenarioStore::open(&path).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 1);
        assert_eq!(reopened.high_water_id().unwrap(), 2);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_json_store_reads_bare_array() {
        let path = temp_path("bare_array");
        fs::write(&path, serde_json::to_string(&vec![scenario(4, "old")]).unwrap()).unwrap();

        let store = JsonFileScenarioStore::open(&path).unwrap();
        assert_eq!(store.list().unwrap()[0].name, "old");
        assert_eq!(store.high_water_id().unwrap(), 4);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_json_store_missing_file_is_empty() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);
        let store = JsonFileScenarioStore::open(&path).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(!path.exists());
    }
}
