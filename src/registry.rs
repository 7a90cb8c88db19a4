//! The in-flight registry: tracks which keys currently have a query running
//! against them, so a second caller for the same key joins the first
//! instead of starting a redundant one.
//!
//! A single `parking_lot::Mutex<HashMap<...>>` guards the whole table. Its
//! critical sections are O(1) (one hash lookup, at most one insert or
//! remove), so a single mutex is the right trade-off here for the same
//! reason `SPEC_FULL.md` §5 gives for the LRU storage's single mutex: a
//! lock-free map would add complexity with no measurable benefit at this
//! contention profile.

use crate::sentinel::{Producer, Sentinel};
use parking_lot::Mutex;
use std::{
    collections::{hash_map::Entry, HashMap},
    hash::Hash,
    sync::Arc,
};

/// The outcome of trying to register a query for a key.
pub(crate) enum Admission<V, E> {
    /// No query was already running for this key; the caller is now the
    /// leader and owns the only [`Producer`] that can resolve `sentinel`.
    Leader(Producer<V, E>, Arc<Sentinel<V, E>>),
    /// A query for this key is already in flight; the caller should wait on
    /// the returned sentinel instead of querying itself.
    Follower(Arc<Sentinel<V, E>>),
}

pub(crate) struct Registry<K, V, E> {
    inflight: Mutex<HashMap<K, Arc<Sentinel<V, E>>>>,
}

impl<K, V, E> Registry<K, V, E>
where
    K: Hash + Eq,
{
    pub(crate) fn new() -> Self {
        Self { inflight: Mutex::new(HashMap::new()) }
    }

    /// Atomically check for an in-flight query on `key` and, if none exists,
    /// register one. Exactly one caller per key observes [`Admission::Leader`]
    /// between registration and the matching [`Registry::remove`].
    pub(crate) fn admit(&self, key: K) -> Admission<V, E> {
        match self.inflight.lock().entry(key) {
            Entry::Occupied(entry) => Admission::Follower(entry.get().clone()),
            Entry::Vacant(entry) => {
                let (sentinel, producer) = Sentinel::pending();
                entry.insert(sentinel.clone());
                Admission::Leader(producer, sentinel)
            }
        }
    }

    /// Remove `key`'s registry entry. The leader calls this only after its
    /// sentinel has already been resolved (published or abandoned), so a
    /// late-arriving follower either observes the resolved sentinel (if it
    /// reads the registry first) or, finding no entry, becomes the next
    /// leader and re-queries — never a follower of a sentinel nobody will
    /// ever resolve.
    pub(crate) fn remove(&self, key: &K) {
        self.inflight.lock().remove(key);
    }
}
