use crate::error::{MacroError, StorageError};
use crate::step::Step;
use crate::storage::{load_json, save_json, KeyValueStorage};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

pub const MACRO_STORAGE_KEY: &str = "roku_macros";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub id: String,
    pub name: String,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub favorite: bool,
}

impl Macro {
    pub fn descriptions(&self) -> Vec<String> {
        self.steps.iter().map(Step::describe).collect()
    }
}

/// Result of a write-through mutation. The in-memory change always stands;
/// `warning` carries a failed write-back.
#[derive(Debug)]
pub struct Persisted<T> {
    pub value: T,
    pub warning: Option<StorageError>,
}

impl<T> Persisted<T> {
    pub fn is_saved(&self) -> bool {
        self.warning.is_none()
    }
}

/// Anything the runner can resolve a macro id against.
pub trait MacroSource {
    fn macro_by_id(&self, id: &str) -> Option<Macro>;
}

pub struct MacroStore<S> {
    storage: S,
    macros: Vec<Macro>,
    last_issued_millis: i64,
}

impl<S: KeyValueStorage> MacroStore<S> {
    /// Loads the persisted list. A corrupt list is logged and replaced by an empty one.
    pub fn open(storage: S) -> Self {
        let mut store = Self {
            storage,
            macros: Vec::new(),
            last_issued_millis: 0,
        };
        match store.load() {
            Ok(count) => log::info!("Loaded {} macros", count),
            Err(e) => log::warn!("Failed to parse macros, starting empty: {}", e),
        }
        store
    }

    /// Replaces the in-memory list with the persisted one. On error the list is
    /// left empty and the error is returned for the caller to report.
    pub fn load(&mut self) -> Result<usize, StorageError> {
        self.macros.clear();
        let loaded: Option<Vec<Macro>> = load_json(&self.storage, MACRO_STORAGE_KEY)?;
        self.macros = loaded.unwrap_or_default();
        Ok(self.macros.len())
    }

    pub fn macros(&self) -> &[Macro] {
        &self.macros
    }

    pub fn get(&self, id: &str) -> Option<&Macro> {
        self.macros.iter().find(|m| m.id == id)
    }

    pub fn find_favorite(&self) -> Option<&Macro> {
        self.macros.iter().find(|m| m.favorite)
    }

    pub fn create(
        &mut self,
        name: &str,
        steps: Vec<Step>,
        favorite: bool,
    ) -> Result<Persisted<Macro>, MacroError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MacroError::EmptyName);
        }
        if steps.is_empty() {
            return Err(MacroError::EmptyStepList);
        }

        let created = Macro {
            id: self.next_id(),
            name: name.to_string(),
            steps,
            favorite,
        };

        if created.favorite {
            for existing in &mut self.macros {
                existing.favorite = false;
            }
        }
        self.macros.push(created.clone());

        Ok(Persisted {
            value: created,
            warning: self.persist(),
        })
    }

    /// Flips the target's flag and clears every other macro's flag, which also
    /// repairs a list that somehow ended up with several favorites.
    /// Returns the target's new flag.
    pub fn toggle_favorite(&mut self, id: &str) -> Result<Persisted<bool>, MacroError> {
        if self.get(id).is_none() {
            return Err(MacroError::NotFound(id.to_string()));
        }

        let mut now_favorite = false;
        for m in &mut self.macros {
            if m.id == id {
                m.favorite = !m.favorite;
                now_favorite = m.favorite;
            } else {
                m.favorite = false;
            }
        }

        Ok(Persisted {
            value: now_favorite,
            warning: self.persist(),
        })
    }

    pub fn delete(&mut self, id: &str) -> Result<Persisted<Macro>, MacroError> {
        let index = self
            .macros
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| MacroError::NotFound(id.to_string()))?;
        let removed = self.macros.remove(index);

        Ok(Persisted {
            value: removed,
            warning: self.persist(),
        })
    }

    fn persist(&self) -> Option<StorageError> {
        match save_json(&self.storage, MACRO_STORAGE_KEY, &self.macros) {
            Ok(()) => None,
            Err(e) => {
                log::warn!("Failed to save macros: {}", e);
                Some(e)
            }
        }
    }

    /// `macro-<unix millis>`, bumped past anything already issued or stored.
    fn next_id(&mut self) -> String {
        let mut millis = chrono::Utc::now()
            .timestamp_millis()
            .max(self.last_issued_millis + 1);
        loop {
            let candidate = format!("macro-{}", millis);
            if self.get(&candidate).is_none() {
                self.last_issued_millis = millis;
                return candidate;
            }
            millis += 1;
        }
    }
}

impl<S: KeyValueStorage> MacroSource for MacroStore<S> {
    fn macro_by_id(&self, id: &str) -> Option<Macro> {
        self.get(id).cloned()
    }
}

impl<T: MacroSource> MacroSource for Mutex<T> {
    fn macro_by_id(&self, id: &str) -> Option<Macro> {
        self.lock()
            .unwrap_or_else(|e| e.into_inner())
            .macro_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn home() -> Vec<Step> {
        vec![Step::KeyPress { key: "Home".into() }]
    }

    fn favorites<S: KeyValueStorage>(store: &MacroStore<S>) -> usize {
        store.macros().iter().filter(|m| m.favorite).count()
    }

    #[test]
    fn create_validates_name_and_steps() {
        let mut store = MacroStore::open(MemoryStorage::new());
        assert_eq!(
            store.create("   ", home(), false).unwrap_err(),
            MacroError::EmptyName
        );
        assert_eq!(
            store.create("Bedtime", Vec::new(), false).unwrap_err(),
            MacroError::EmptyStepList
        );
        assert!(store.macros().is_empty());
    }

    #[test]
    fn create_trims_name_and_issues_unique_ids() {
        let mut store = MacroStore::open(MemoryStorage::new());
        let a = store.create(" Morning ", home(), false).unwrap().value;
        let b = store.create("Evening", home(), false).unwrap().value;
        assert_eq!(a.name, "Morning");
        assert!(a.id.starts_with("macro-"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn favorite_on_create_clears_others() {
        let mut store = MacroStore::open(MemoryStorage::new());
        let first = store.create("One", home(), true).unwrap().value;
        let second = store.create("Two", home(), true).unwrap().value;
        assert_eq!(favorites(&store), 1);
        assert!(!store.get(&first.id).unwrap().favorite);
        assert_eq!(store.find_favorite().unwrap().id, second.id);
    }

    #[test]
    fn toggle_favorite_flips_and_unsets() {
        let mut store = MacroStore::open(MemoryStorage::new());
        let id = store.create("One", home(), false).unwrap().value.id;
        assert!(store.toggle_favorite(&id).unwrap().value);
        assert!(!store.toggle_favorite(&id).unwrap().value);
        assert!(store.find_favorite().is_none());
        assert!(matches!(
            store.toggle_favorite("macro-0"),
            Err(MacroError::NotFound(_))
        ));
    }

    #[test]
    fn toggle_repairs_multiple_favorites_from_storage() {
        let json = r#"[
            {"id":"macro-1","name":"A","steps":[{"type":"key","key":"Home"}],"favorite":true},
            {"id":"macro-2","name":"B","steps":[{"type":"key","key":"Home"}],"favorite":true},
            {"id":"macro-3","name":"C","steps":[{"type":"key","key":"Home"}],"favorite":false}
        ]"#;
        let mut store = MacroStore::open(MemoryStorage::with_value(MACRO_STORAGE_KEY, json));
        assert_eq!(favorites(&store), 2);

        // unsetting macro-1 still clears macro-2
        assert!(!store.toggle_favorite("macro-1").unwrap().value);
        assert_eq!(favorites(&store), 0);
    }

    #[test]
    fn delete_removes_and_reports_missing() {
        let mut store = MacroStore::open(MemoryStorage::new());
        let id = store.create("One", home(), true).unwrap().value.id;
        let removed = store.delete(&id).unwrap();
        assert_eq!(removed.value.name, "One");
        assert!(store.find_favorite().is_none());
        assert_eq!(
            store.delete(&id).unwrap_err(),
            MacroError::NotFound(id.clone())
        );
    }

    #[test]
    fn corrupt_storage_loads_empty() {
        let store = MacroStore::open(MemoryStorage::with_value(MACRO_STORAGE_KEY, "oops"));
        assert!(store.macros().is_empty());
    }

    #[test]
    fn load_reports_corruption_to_caller() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = MacroStore::open(storage.clone());
        storage.save(MACRO_STORAGE_KEY, "[{").unwrap();
        assert!(matches!(store.load(), Err(StorageError::Corrupt { .. })));
        assert!(store.macros().is_empty());
    }

    #[test]
    fn mutations_write_through() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = MacroStore::open(storage.clone());
        let created = store.create("Bedtime", home(), true).unwrap();
        assert!(created.is_saved());

        let reopened = MacroStore::open(storage.clone());
        assert_eq!(reopened.macros(), store.macros());
    }

    #[test]
    fn failed_write_keeps_memory_state() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = MacroStore::open(storage.clone());
        storage.set_fail_writes(true);

        let created = store.create("Bedtime", home(), false).unwrap();
        assert!(!created.is_saved());
        assert_eq!(store.macros().len(), 1);
        assert_eq!(storage.raw(MACRO_STORAGE_KEY), None);
    }

    #[test]
    fn mutex_wrapped_store_is_a_source() {
        let mut store = MacroStore::open(MemoryStorage::new());
        let id = store.create("One", home(), false).unwrap().value.id;
        let shared = Mutex::new(store);
        assert_eq!(shared.macro_by_id(&id).unwrap().name, "One");
        assert!(shared.macro_by_id("nope").is_none());
    }

    #[test]
    fn poisoned_store_still_finds_macros() {
        let mut store = MacroStore::open(MemoryStorage::new());
        let id = store.create("One", home(), false).unwrap().value.id;
        let shared = Arc::new(Mutex::new(store));
        let poisoner = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the store lock");
        })
        .join();
        assert!(shared.is_poisoned());
        assert_eq!(shared.macro_by_id(&id).unwrap().name, "One");
    }
}
