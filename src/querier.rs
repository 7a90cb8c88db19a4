//! The querier: how a coordinator produces a value on a cache miss.
//!
//! This mirrors the original's `QueryFunc` adapter
//! (`examples/original_source/query.go`), which let a plain function satisfy
//! the `Query` interface without a dedicated type. Here any `Fn(&K, &Cancel)
//! -> Result<V, E>` closure satisfies [`Querier`] via the blanket impl below,
//! so most callers never need to name a concrete querier type at all.

use crate::cancel::Cancel;

/// Produces a value for `key` when the coordinator can't satisfy a `get`
/// from storage alone.
pub trait Querier<K, V, E> {
    /// Compute the value for `key`. Returning an error whose
    /// [`crate::NotFoundKind::is_not_found`] is `true` tells the coordinator
    /// "this key genuinely has no value," distinct from an opaque upstream
    /// failure that stale-on-error policy may choose to mask.
    fn query(&self, key: &K, cancel: &Cancel) -> Result<V, E>;
}

impl<K, V, E, F> Querier<K, V, E> for F
where
    F: Fn(&K, &Cancel) -> Result<V, E>,
{
    fn query(&self, key: &K, cancel: &Cancel) -> Result<V, E> {
        self(key, cancel)
    }
}

/// A [`Querier`] that reports every key as not found, without the caller
/// having to write a closure for it. Useful for a read-only coordinator that
/// should never populate misses itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotFoundQuery;

/// The error [`NotFoundQuery`] always returns.
#[derive(Debug, thiserror::Error)]
#[error("no querier configured for this key")]
pub struct Unqueried;

impl crate::error::NotFoundKind for Unqueried {
    fn is_not_found(&self) -> bool {
        true
    }
}

impl<V> crate::error::ExpiredKind<V> for Unqueried {
    fn is_expired(&self) -> bool {
        false
    }

    fn stale_value(&self) -> Option<V> {
        None
    }
}

impl<K, V> Querier<K, V, Unqueried> for NotFoundQuery {
    fn query(&self, _key: &K, _cancel: &Cancel) -> Result<V, Unqueried> {
        Err(Unqueried)
    }
}
