//! In-memory selection state.
//!
//! Grids track "currently selected row ids" per selection key. Row ids are
//! stored as strings, the form they arrive in from view state; they convert
//! to the primary key's type when a selector restricts to the selection.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct SelectionState {
    inner: Mutex<HashMap<String, HashSet<String>>>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark ids selected or deselected under `key`. Returns how many ids
    /// actually changed state.
    pub fn set_selected<I, S>(&self, key: &str, ids: I, selected: bool) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let set = map.entry(key.to_string()).or_default();
        let mut changed = 0;
        for id in ids {
            let id = id.into();
            let did = if selected {
                set.insert(id)
            } else {
                set.remove(&id)
            };
            if did {
                changed += 1;
            }
        }
        changed
    }

    pub fn is_selected(&self, key: &str, id: &str) -> bool {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.get(key).map_or(false, |set| set.contains(id))
    }

    /// Snapshot of the selected ids under `key`, sorted for determinism.
    pub fn selected(&self, key: &str) -> Vec<String> {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = map
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn count(&self, key: &str) -> usize {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.get(key).map_or(0, |set| set.len())
    }

    pub fn clear(&self, key: &str) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
    }
}
