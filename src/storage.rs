//! The storage contract and its optional capabilities.
//!
//! A [`Storage`] only has to support `get` and `set`. Everything else —
//! deleting keys, clearing the whole backend, overriding a TTL per call — is
//! an opt-in capability expressed as its own supertrait. Whether a given
//! backend supports one is a fact known only where it's implemented, so each
//! [`Storage`] impl declares it once, there, by overriding the matching
//! `capability_*` method to return `Some` of its own method. A
//! [`crate::Coordinator`] built over the storage reads these back at
//! construction and stores them as a small table of function pointers,
//! turning every capability-gated call into a cheap `Option` check instead of
//! the original's runtime type assertion against an `interface{ Del(...) }`-
//! shaped interface (`examples/original_source/storage.go`).
use crate::{cancel::Cancel, error::NotFoundKind};
use std::time::Duration;

/// A storage's batch-delete entry point, as handed to a coordinator by
/// [`Storage::capability_del`].
pub type DelFn<S> = fn(&S, &Cancel, &[<S as Storage>::Key]) -> Result<(), <S as Storage>::Error>;

/// A storage's TTL-overriding write entry point, as handed to a coordinator
/// by [`Storage::capability_set_with_ttl`].
pub type SetWithTtlFn<S> =
    fn(&S, &Cancel, &<S as Storage>::Key, <S as Storage>::Value, Duration) -> Result<(), <S as Storage>::Error>;

/// A storage's clear-everything entry point, as handed to a coordinator by
/// [`Storage::capability_clear`].
pub type ClearFn<S> = fn(&S, &Cancel) -> Result<(), <S as Storage>::Error>;

/// The minimal contract every cache backend must satisfy.
pub trait Storage {
    /// The key type this storage is indexed by.
    type Key: std::hash::Hash + Eq + Clone + Send + Sync + 'static;
    /// The value type this storage holds.
    type Value: Clone + Send + Sync + 'static;
    /// This storage's opaque error type. Implement [`NotFoundKind`] on it
    /// (and [`crate::ExpiredKind`] if entries can expire in place) so the
    /// coordinator can classify a failed `get` without knowing the concrete
    /// type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up `key`. A miss is reported as an `Err` whose
    /// [`NotFoundKind::is_not_found`] returns `true`, not as `Ok(None)` —
    /// this keeps one error channel instead of a result-of-option, and lets
    /// a single error type carry both "missing" and "expired" as distinct
    /// kinds.
    fn get(&self, cancel: &Cancel, key: &Self::Key) -> Result<Self::Value, Self::Error>;

    /// Write `value` for `key`, using this storage's default TTL policy (no
    /// expiry, if the backend doesn't support one).
    fn set(&self, cancel: &Cancel, key: &Self::Key, value: Self::Value) -> Result<(), Self::Error>;

    /// `Some(Self::del)` if this storage implements [`DeletableStorage`].
    /// A coordinator reads this once, at construction, rather than
    /// re-probing on every call.
    fn capability_del() -> Option<DelFn<Self>>
    where
        Self: Sized,
    {
        None
    }

    /// `Some(Self::set_with_ttl)` if this storage implements
    /// [`SetWithTtlStorage`].
    fn capability_set_with_ttl() -> Option<SetWithTtlFn<Self>>
    where
        Self: Sized,
    {
        None
    }

    /// `Some(Self::clear)` if this storage implements [`ClearableStorage`].
    fn capability_clear() -> Option<ClearFn<Self>>
    where
        Self: Sized,
    {
        None
    }
}

/// Opt-in: remove a batch of keys.
pub trait DeletableStorage: Storage {
    /// Remove every key in `keys`, at-least-once per key; the order keys are
    /// removed in is unspecified. Removing an absent key is not an error.
    fn del(&self, cancel: &Cancel, keys: &[Self::Key]) -> Result<(), Self::Error>;
}

/// Opt-in: write a value with a TTL that overrides this storage's default.
pub trait SetWithTtlStorage: Storage {
    /// Write `value` for `key`, expiring after `ttl` regardless of this
    /// storage's default TTL policy. A `ttl` of [`Duration::ZERO`] means
    /// "never expires," matching this crate's zero-value convention.
    fn set_with_ttl(
        &self,
        cancel: &Cancel,
        key: &Self::Key,
        value: Self::Value,
        ttl: Duration,
    ) -> Result<(), Self::Error>;
}

/// Opt-in: drop every entry at once.
pub trait ClearableStorage: Storage {
    /// Remove every entry currently held by this storage.
    fn clear(&self, cancel: &Cancel) -> Result<(), Self::Error>;
}

/// A [`Storage`] that never has anything: `get` always misses, `set` is a
/// no-op that always succeeds. Layering a [`crate::Coordinator`] over this
/// yields pure single-flight deduplication with no caching at all — useful
/// when the only thing worth coordinating is "don't run the same expensive
/// query twice concurrently."
#[derive(Debug, Default, Clone, Copy)]
pub struct NopStorage<K, V> {
    _key: std::marker::PhantomData<fn() -> K>,
    _value: std::marker::PhantomData<fn() -> V>,
}

impl<K, V> NopStorage<K, V> {
    /// A storage that always misses.
    pub fn new() -> Self {
        Self { _key: std::marker::PhantomData, _value: std::marker::PhantomData }
    }
}

/// The error [`NopStorage::get`] always returns: every lookup is a miss.
#[derive(Debug, thiserror::Error)]
#[error("nop storage never has anything")]
pub struct Miss;

impl NotFoundKind for Miss {
    fn is_not_found(&self) -> bool {
        true
    }
}

impl<V> crate::error::ExpiredKind<V> for Miss {
    fn is_expired(&self) -> bool {
        false
    }

    fn stale_value(&self) -> Option<V> {
        None
    }
}

impl<K, V> Storage for NopStorage<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;
    type Error = Miss;

    fn get(&self, _cancel: &Cancel, _key: &K) -> Result<V, Miss> {
        Err(Miss)
    }

    fn set(&self, _cancel: &Cancel, _key: &K, _value: V) -> Result<(), Miss> {
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

impl<K, V> DeletableStorage for NopStorage<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn del(&self, _cancel: &Cancel, _keys: &[K]) -> Result<(), Miss> {
        Ok(())
    }
}

impl<K, V> ClearableStorage for NopStorage<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clear(&self, _cancel: &Cancel) -> Result<(), Miss> {
        Ok(())
    }
}

impl<K, V> SetWithTtlStorage for NopStorage<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn set_with_ttl(&self, _cancel: &Cancel, _key: &K, _value: V, _ttl: Duration) -> Result<(), Miss> {
        Ok(())
    }
}
