// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mutex-protected name -> value map.
//!
//! The directory keeps each registry behind one of these. All reads
//! hand out clones; iteration copies under the lock and releases, so
//! user code (predicates included) never runs while the lock is held.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

/// A name-keyed map guarded by a single mutex.
#[derive(Debug, Default)]
pub struct MutexedLookup<V> {
    map: Mutex<HashMap<String, V>>,
}

impl<V: Clone> MutexedLookup<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Clone of the value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.map.lock().get(key).cloned()
    }

    /// Insert or replace; returns the previous value.
    pub fn set(&self, key: impl Into<String>, value: V) -> Option<V> {
        self.map.lock().insert(key.into(), value)
    }

    /// Insert only if `key` is absent; otherwise returns a clone of
    /// the existing value untouched.
    pub fn try_insert(&self, key: impl Into<String>, value: V) -> Option<V> {
        let mut map = self.map.lock();
        let key = key.into();
        match map.get(&key) {
            Some(existing) => Some(existing.clone()),
            None => {
                map.insert(key, value);
                None
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.map.lock().remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.map.lock().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Sorted copy of the keys.
    #[must_use]
    pub fn snapshot_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Ordered copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, V> {
        self.map
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Remove every entry matching `predicate` and return the removed
    /// keys. The predicate runs on a snapshot, outside the lock.
    pub fn filter_remove(&self, predicate: impl Fn(&str, &V) -> bool) -> Vec<String> {
        let snapshot = self.snapshot();
        let matched: Vec<String> = snapshot
            .iter()
            .filter(|(key, value)| predicate(key, value))
            .map(|(key, _)| key.clone())
            .collect();

        let mut map = self.map.lock();
        let mut removed = Vec::with_capacity(matched.len());
        for key in matched {
            if map.remove(&key).is_some() {
                removed.push(key);
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let lookup = MutexedLookup::new();
        assert!(lookup.is_empty());
        assert_eq!(lookup.set("a", 1), None);
        assert_eq!(lookup.set("a", 2), Some(1));
        assert_eq!(lookup.get("a"), Some(2));
        assert_eq!(lookup.remove("a"), Some(2));
        assert_eq!(lookup.get("a"), None);
    }

    #[test]
    fn try_insert_keeps_existing() {
        let lookup = MutexedLookup::new();
        assert_eq!(lookup.try_insert("svc", "e1"), None);
        assert_eq!(lookup.try_insert("svc", "e2"), Some("e1"));
        assert_eq!(lookup.get("svc"), Some("e1"));
    }

    #[test]
    fn snapshots_are_sorted_copies() {
        let lookup = MutexedLookup::new();
        lookup.set("b", 2);
        lookup.set("a", 1);
        assert_eq!(lookup.snapshot_keys(), vec!["a", "b"]);

        let snapshot = lookup.snapshot();
        lookup.set("c", 3);
        assert_eq!(snapshot.len(), 2); // copy, not a view
    }

    #[test]
    fn filter_remove_returns_removed_keys() {
        let lookup = MutexedLookup::new();
        lookup.set("svc1", "e1");
        lookup.set("svc2", "e2");
        lookup.set("svc3", "e1");

        let mut removed = lookup.filter_remove(|_, owner| *owner == "e1");
        removed.sort();
        assert_eq!(removed, vec!["svc1", "svc3"]);
        assert_eq!(lookup.len(), 1);
        assert!(lookup.contains("svc2"));
    }

    #[test]
    fn concurrent_access_is_consistent() {
        use std::sync::Arc;

        let lookup = Arc::new(MutexedLookup::new());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let lookup = Arc::clone(&lookup);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        lookup.set(format!("key-{t}-{i}"), i);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(lookup.len(), 200);
    }
}
