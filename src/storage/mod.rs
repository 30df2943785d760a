//! Keyspace
//!
//! A deliberately small store backing GET and SET. The interesting parts
//! of this crate are upstream of here (decoding and dispatch); the store
//! exists so commands have somewhere to land and the server runs end to
//! end. Keys are raw bytes, values are [`Value`]s, which clone by
//! refcount so reads hand out cheap copies.

use crate::protocol::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Shared in-memory key-value store.
#[derive(Debug, Default)]
pub struct Store {
    entries: RwLock<HashMap<Vec<u8>, Value>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Inserts or replaces the value for `key`.
    pub fn set(&self, key: &[u8], value: Value) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_vec(), value);
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let store = Store::new();
        store.set(b"name", Value::from("ember"));
        assert_eq!(store.get(b"name"), Some(Value::from("ember")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing_key() {
        let store = Store::new();
        assert_eq!(store.get(b"nope"), None);
    }

    #[test]
    fn test_set_overwrites() {
        let store = Store::new();
        store.set(b"k", Value::from("v1"));
        store.set(b"k", Value::from("v2"));
        assert_eq!(store.get(b"k"), Some(Value::from("v2")));
        assert_eq!(store.len(), 1);
    }
}
