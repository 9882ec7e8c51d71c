//! Process-wide upload progress tracking.
//!
//! [`ProgressRegistry`] is the one piece of cross-request shared state:
//! a mutex-guarded map from opaque client-supplied progress ids to a
//! shared [`Progress`] counter pair. Structural operations
//! (`insert`/`lookup`/`remove`) take the mutex; the `uploaded` counter
//! itself is an atomic so the owning request can bump it every chunk
//! without contending on the same lock a concurrent poll is reading
//! under.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

/// Opaque, client-chosen identifier joining an upload POST to concurrent
/// progress-poll GETs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressId(pub String);

impl fmt::Display for ProgressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared `{uploaded, size}` counter pair for one in-flight upload.
///
/// `size` is set once at construction and never changes; `uploaded` is
/// monotonically non-decreasing and bounded by `size`. Reads and writes
/// both go through relaxed atomic loads/stores: a 64-bit progress
/// counter carries no ordering requirement with any other memory, only
/// freedom from torn reads.
#[derive(Debug)]
pub struct Progress {
    uploaded: AtomicU64,
    size: u64,
}

impl Progress {
    #[must_use]
    pub fn new(size: u64) -> Self {
        Self { uploaded: AtomicU64::new(0), size }
    }

    /// Adds `n` bytes to the uploaded counter. Called once per body chunk,
    /// before that chunk is parsed.
    pub fn add_uploaded(&self, n: u64) {
        self.uploaded.fetch_add(n, Ordering::Relaxed);
    }

    /// A consistent snapshot of `{uploaded, size}` for the progress endpoint.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64) {
        (self.uploaded.load(Ordering::Relaxed), self.size)
    }
}

/// Why [`ProgressRegistry::insert`] rejected an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// An entry already exists for this id.
    Duplicate,
    /// The registry already holds `max_entries` entries.
    Full,
}

/// Process-wide mapping from progress id to shared [`Progress`] entry.
#[derive(Debug, Default)]
pub struct ProgressRegistry {
    entries: Mutex<HashMap<ProgressId, Arc<Progress>>>,
}

impl ProgressRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The lazily-initialized process-wide singleton.
    pub fn global() -> &'static ProgressRegistry {
        static REGISTRY: Lazy<ProgressRegistry> = Lazy::new(ProgressRegistry::new);
        &REGISTRY
    }

    /// Inserts a new entry, returning the shared handle the owning
    /// request will mutate directly.
    ///
    /// `max_entries` bounds how many concurrent entries the registry
    /// will hold; once at capacity, further inserts are rejected rather
    /// than growing the map without bound.
    ///
    /// # Errors
    /// Returns [`InsertError::Duplicate`] if an entry already exists for
    /// `id` (progress ids are client-supplied and must not collide with
    /// a live upload), or [`InsertError::Full`] if the registry already
    /// holds `max_entries` entries.
    pub fn insert(&self, id: ProgressId, size: u64, max_entries: usize) -> Result<Arc<Progress>, InsertError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if entries.contains_key(&id) {
            return Err(InsertError::Duplicate);
        }
        if entries.len() >= max_entries {
            return Err(InsertError::Full);
        }
        let progress = Arc::new(Progress::new(size));
        entries.insert(id, Arc::clone(&progress));
        Ok(progress)
    }

    /// Looks up a consistent snapshot for `id`.
    #[must_use]
    pub fn lookup(&self, id: &ProgressId) -> Option<(u64, u64)> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.get(id).map(|p| p.snapshot())
    }

    /// Removes the entry for `id`, if present.
    pub fn remove(&self, id: &ProgressId) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lookup_remove_roundtrip() {
        let registry = ProgressRegistry::new();
        let id = ProgressId("p1".to_owned());
        let progress = registry.insert(id.clone(), 100, 10).unwrap();

        progress.add_uploaded(40);
        assert_eq!(registry.lookup(&id), Some((40, 100)));

        registry.remove(&id);
        assert_eq!(registry.lookup(&id), None);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let registry = ProgressRegistry::new();
        let id = ProgressId("dup".to_owned());
        registry.insert(id.clone(), 10, 10).unwrap();
        assert_eq!(registry.insert(id, 20, 10), Err(InsertError::Duplicate));
    }

    #[test]
    fn insert_beyond_max_entries_is_rejected() {
        let registry = ProgressRegistry::new();
        registry.insert(ProgressId("a".to_owned()), 10, 1).unwrap();
        let err = registry.insert(ProgressId("b".to_owned()), 10, 1).unwrap_err();
        assert_eq!(err, InsertError::Full);
    }

    #[test]
    fn uploaded_is_monotonic_and_bounded_by_size() {
        let progress = Progress::new(10);
        progress.add_uploaded(4);
        progress.add_uploaded(4);
        let (uploaded, size) = progress.snapshot();
        assert_eq!(uploaded, 8);
        assert!(uploaded <= size);
    }

    #[test]
    fn lookup_missing_is_none() {
        let registry = ProgressRegistry::new();
        assert_eq!(registry.lookup(&ProgressId("nope".to_owned())), None);
        assert_eq!(registry.len(), 0);
    }
}
