//! In-memory key-value store shared by every running script.
//!
//! The store is a single map behind a single mutex: every operation is atomic
//! with respect to every other, which is all scripts running concurrently from
//! different triggers can rely on. There is no per-key locking.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;

/// Errors returned by [`KvStore`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    /// `put` was called for a key that is already stored.
    #[error("key '{0}' already exists")]
    AlreadyExists(String),

    /// `get` or `delete` was called for a key that is not stored.
    #[error("key '{0}' not found")]
    NotFound(String),
}

/// Process-wide string map mutated by scripts.
#[derive(Debug, Default)]
pub struct KvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KvStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // Every operation is a single map call, so a poisoned map is still consistent.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts `key → value`. Fails if the key is already present, leaving the
    /// stored value untouched.
    #[tracing::instrument(skip(self, value), level = "debug")]
    pub fn put(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut entries = self.entries();
        if entries.contains_key(key) {
            return Err(KvError::AlreadyExists(key.to_string()));
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Inserts or overwrites `key → value`.
    #[tracing::instrument(skip(self, value), level = "debug")]
    pub fn upsert(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<String, KvError> {
        self.entries().get(key).cloned().ok_or_else(|| KvError::NotFound(key.to_string()))
    }

    /// Removes `key`. Fails if the key is not present.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries().remove(key).map(|_| ()).ok_or_else(|| KvError::NotFound(key.to_string()))
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
