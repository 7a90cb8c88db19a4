//! A bounded, per-entry-TTL LRU [`Storage`](readthrough::Storage) backend —
//! the reference in-process storage this crate exists to provide, mirroring
//! `examples/original_source/lrucache/lrucache.go`'s `LRUCache`.

use crate::list::OrderedMap;
use parking_lot::Mutex;
use readthrough::{
    Cancel, ClearFn, ClearableStorage, DelFn, DeletableStorage, ExpiredKind, NotFoundKind, SetWithTtlFn,
    SetWithTtlStorage, Storage,
};
use std::{
    hash::Hash,
    time::{Duration, Instant},
};

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// This storage's error type: every outcome other than success is either
/// "nothing here" or "something was here, but it's past its TTL" — the two
/// kinds `readthrough`'s coordinator knows how to act on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error<V> {
    /// No entry for this key.
    #[error("not found")]
    NotFound,
    /// An entry exists but is past its TTL. Carries the stale value, which
    /// the coordinator may serve under its stale-on-error policy.
    #[error("expired")]
    Expired(V),
}

impl<V> NotFoundKind for Error<V> {
    fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

impl<V: Clone> ExpiredKind<V> for Error<V> {
    fn is_expired(&self) -> bool {
        matches!(self, Error::Expired(_))
    }

    fn stale_value(&self) -> Option<V> {
        match self {
            Error::Expired(value) => Some(value.clone()),
            Error::NotFound => None,
        }
    }
}

struct Inner<K, V> {
    entries: OrderedMap<K, Entry<V>>,
}

/// A bounded, in-process LRU cache with per-entry expiry, serving as the
/// reference [`Storage`] backend for `readthrough`.
///
/// `max_entries = 0` means unbounded; `default_ttl = Duration::ZERO` means
/// entries never expire — both match the original's zero-value defaults.
/// A single `parking_lot::Mutex` serializes every operation (`SPEC_FULL.md`
/// §5): the critical sections are O(1) and short, so a single lock is the
/// right trade-off over sharding.
pub struct LruStorage<K, V> {
    max_entries: usize,
    default_ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

/// Builds an [`LruStorage`].
pub struct LruStorageBuilder {
    max_entries: usize,
    default_ttl: Duration,
}

impl LruStorageBuilder {
    /// Start from the defaults: unbounded, no expiry.
    pub fn new() -> Self {
        Self { max_entries: 0, default_ttl: Duration::ZERO }
    }

    /// Cap the number of live entries. `0` means unbounded.
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// The TTL applied by `set` calls that don't specify their own.
    /// [`Duration::ZERO`] means entries never expire.
    pub fn default_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    /// Finish building.
    pub fn build<K, V>(self) -> LruStorage<K, V>
    where
        K: Hash + Eq + Clone,
    {
        LruStorage {
            max_entries: self.max_entries,
            default_ttl: self.default_ttl,
            inner: Mutex::new(Inner { entries: OrderedMap::new() }),
        }
    }
}

impl Default for LruStorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LruStorage<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Start building an [`LruStorage`] with defaults (unbounded, no expiry).
    pub fn builder() -> LruStorageBuilder {
        LruStorageBuilder::new()
    }

    /// The number of entries currently held, including ones retained past
    /// expiry for stale-on-error.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// `true` if this storage currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self, key: &K, value: V, ttl: Duration) {
        let expires_at = if ttl.is_zero() { None } else { Some(Instant::now() + ttl) };
        let mut inner = self.inner.lock();

        if let Some(slot) = inner.entries.position(key) {
            *inner.entries.value_mut(slot) = Entry { value, expires_at };
            inner.entries.move_to_front(key);
            return;
        }

        inner.entries.push_front(key.clone(), Entry { value, expires_at });

        if self.max_entries > 0 {
            while inner.entries.len() > self.max_entries {
                inner.entries.pop_back();
            }
        }
    }
}

impl<K, V> Storage for LruStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;
    type Error = Error<V>;

    fn get(&self, _cancel: &Cancel, key: &K) -> Result<V, Error<V>> {
        let mut inner = self.inner.lock();
        let slot = inner.entries.position(key).ok_or(Error::NotFound)?;

        let expired = match inner.entries.value(slot).expires_at {
            Some(expires_at) => Instant::now() >= expires_at,
            None => false,
        };

        if expired {
            let value = inner.entries.value(slot).value.clone();
            inner.entries.move_to_back(key);
            return Err(Error::Expired(value));
        }

        let value = inner.entries.value(slot).value.clone();
        inner.entries.move_to_front(key);
        Ok(value)
    }

    fn set(&self, _cancel: &Cancel, key: &K, value: V) -> Result<(), Error<V>> {
        self.write(key, value, self.default_ttl);
        Ok(())
    }

    fn capability_del() -> Option<DelFn<Self>> {
        Some(Self::del)
    }

    fn capability_set_with_ttl() -> Option<SetWithTtlFn<Self>> {
        Some(Self::set_with_ttl)
    }

    fn capability_clear() -> Option<ClearFn<Self>> {
        Some(Self::clear)
    }
}

impl<K, V> DeletableStorage for LruStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn del(&self, _cancel: &Cancel, keys: &[K]) -> Result<(), Error<V>> {
        let mut inner = self.inner.lock();
        for key in keys {
            inner.entries.remove(key);
        }
        Ok(())
    }
}

impl<K, V> SetWithTtlStorage for LruStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn set_with_ttl(&self, _cancel: &Cancel, key: &K, value: V, ttl: Duration) -> Result<(), Error<V>> {
        self.write(key, value, ttl);
        Ok(())
    }
}

impl<K, V> ClearableStorage for LruStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clear(&self, _cancel: &Cancel) -> Result<(), Error<V>> {
        self.inner.lock().entries.clear();
        Ok(())
    }
}
