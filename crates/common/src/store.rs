// DevSim - Scripted Device Simulator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Concurrency-safe key/value storage for script state.

use std::sync::Arc;

use dashmap::DashMap;

use crate::Value;

/// A string-keyed map of [`Value`]s that can be shared across threads.
///
/// Cloning the store produces another handle to the same map. The same type
/// backs both the persistent store a compiled unit keeps between invocations
/// and the shared state wired in by the application.
#[derive(Debug, Clone, Default)]
pub struct KeyValueStore {
    entries: Arc<DashMap<String, Value>>,
}

impl KeyValueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value stored under `key`, or [`Value::Null`].
    pub fn get(&self, key: &str) -> Value {
        self.entries.get(key).map(|entry| entry.value().clone()).unwrap_or_default()
    }

    /// Stores `value` under `key` and returns the previous value, if any.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Removes the entry for `key`.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    /// Returns true if an entry for `key` exists.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Returns a sorted copy of all entries.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<_> =
            self.entries.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Returns true if both handles point to the same underlying map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_set_remove() {
        let store = KeyValueStore::new();
        assert_eq!(store.get("missing"), Value::Null);

        assert_eq!(store.set("count", 1i64), None);
        assert_eq!(store.set("count", 2i64), Some(Value::Int(1)));
        assert_eq!(store.get("count"), Value::Int(2));
        assert!(store.contains("count"));

        assert_eq!(store.remove("count"), Some(Value::Int(2)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let store = KeyValueStore::new();
        let other = store.clone();
        other.set("mode", "idle");

        assert!(store.ptr_eq(&other));
        assert_eq!(store.get("mode"), Value::Text("idle".into()));
        assert!(!store.ptr_eq(&KeyValueStore::new()));
    }

    #[test]
    fn test_concurrent_writers() {
        let store = KeyValueStore::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    for j in 0..25 {
                        store.set(format!("k{i}-{j}"), j as i64);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 100);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.first().map(|(k, _)| k.as_str()), Some("k0-0"));
        store.clear();
        assert!(store.is_empty());
    }
}
