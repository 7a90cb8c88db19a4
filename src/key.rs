//! Optional key projection.
//!
//! A caller-supplied key may be a rich request object that's expensive or
//! awkward to use as a storage/registry index directly. Implementing
//! [`CacheKey`] lets such a type expose a compact "storage key" that the
//! coordinator uses for every storage and in-flight-registry lookup, while
//! still passing the original, rich key to the [`crate::Querier`].
//!
//! Types that don't implement `CacheKey` are used as their own storage key
//! via the blanket impl below — the common case, and the only case the
//! original Go implementation supported (it had no projection concept at
//! all; any hashable key was used as-is for both storage and query).

use std::hash::Hash;

/// Maps a rich request key to the compact key used for storage and
/// single-flight coordination.
pub trait CacheKey {
    /// The type used to index storage and the in-flight registry.
    type StorageKey: Hash + Eq + Clone + Send + Sync + 'static;

    /// Project this key down to its storage key.
    fn cache_key(&self) -> Self::StorageKey;
}

/// Any plain hashable key is its own storage key.
impl<K> CacheKey for K
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
{
    type StorageKey = K;

    fn cache_key(&self) -> K {
        self.clone()
    }
}
