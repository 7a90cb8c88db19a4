//! The coordinator's error taxonomy.
//!
//! Storages and queriers return their own error types; this crate only needs
//! to know whether a given error means "not found" or "expired, but still
//! carrying the stale value." Rather than matching on a fixed set of
//! concrete types (or reaching for `dyn Any`), we ask the storage/querier to
//! opt in by implementing one of two marker traits. This is the compile-time
//! analogue of the original's `NotFound`/`Expired` error interfaces
//! (`examples/original_source/errors.go`): any error type can tag itself as
//! one of these kinds without the coordinator needing to know its concrete
//! type ahead of time.

use crate::cancel::Cancelled;
use std::{fmt::Debug, sync::Arc};

/// Implemented by a storage's error type to mean "no entry for this key."
/// The coordinator treats this as a miss.
pub trait NotFoundKind {
    /// Does this particular error value represent a "not found" outcome?
    ///
    /// Most implementations are unconditional (`true` always, for a
    /// dedicated "not found" error variant); the method form exists so that
    /// a storage with a single broad error enum can still distinguish kinds
    /// value-by-value.
    fn is_not_found(&self) -> bool;
}

/// Implemented by a storage's error type to mean "entry exists, value is
/// populated, but is past TTL." The coordinator treats this as a miss for
/// refresh purposes *and* keeps `stale_value()` as the stale candidate.
///
/// Generic over the storage's value type because, unlike "not found," an
/// expired outcome has to carry the expired value back out — the original's
/// `Get(ctx, key, out)` populates `out` even when it returns its `Expired`
/// error (`examples/original_source/lrucache/lrucache.go`); here that
/// populated-out-param becomes this trait's `stale_value`.
pub trait ExpiredKind<V> {
    /// Does this particular error value represent an "expired" outcome?
    fn is_expired(&self) -> bool;

    /// The value that was present but past its TTL, if `is_expired()`.
    fn stale_value(&self) -> Option<V>;
}

/// Errors the coordinator can return to a caller.
///
/// `E` is the opaque error type of whichever storage or querier produced it;
/// it is never inspected by the coordinator once classified, only
/// propagated. `V` only appears in [`Error::Stale`], where the original's
/// tuple return of `(stale_value, error)` (`examples/original_source/cachex.go`'s
/// stale-on-error path) becomes a single `Err` that still carries the stale
/// value a caller can choose to use.
#[derive(thiserror::Error, Debug)]
pub enum Error<V, E>
where
    V: Debug,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Nothing is present for this key and no querier could produce a value
    /// (or the querier also reported "not found").
    #[error("not found")]
    NotFound,

    /// The requested capability (a custom TTL, `del`, `clear`) is not
    /// supported by the configured storage.
    #[error("not supported")]
    NotSupported,

    /// The calling context was cancelled, or its deadline elapsed, before a
    /// result could be produced.
    #[error("cancelled: {0}")]
    Cancelled(#[from] Cancelled),

    /// An opaque error surfaced from the storage backend.
    ///
    /// Wrapped in `Arc` rather than held by value: when a single-flight
    /// query fails, every waiter on the [`crate::Sentinel`] needs its own
    /// copy of the outcome, and `E` itself is not required to be `Clone`
    /// (many real storage/querier error types, e.g. ones wrapping
    /// `std::io::Error`, aren't). Sharing the one error behind an `Arc` costs
    /// a refcount bump per waiter instead of requiring the whole taxonomy to
    /// demand `E: Clone`.
    #[error("storage error: {0}")]
    Storage(#[source] Arc<E>),

    /// An opaque error surfaced from the querier, distinct from [`Error::Storage`]
    /// so callers can tell which side of the read-through boundary failed.
    #[error("query error: {0}")]
    Query(#[source] Arc<E>),

    /// A refresh query failed while `use_stale_when_error` was enabled and a
    /// previously cached, expired value was available: the caller gets that
    /// stale value alongside the error that prevented a fresh one.
    #[error("stale value served after query error: {source}")]
    Stale {
        /// The expired value that was retained and served in place of a
        /// fresh one.
        value: V,
        /// The querier error that triggered falling back to `value`.
        #[source]
        source: Arc<E>,
    },
}

impl<V, E> Error<V, E>
where
    V: Debug,
    E: std::error::Error + Send + Sync + 'static,
{
    /// `true` for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Manual rather than derived: every variant is cheaply cloneable regardless
/// of whether `E` is `Clone` (the `Arc<E>` fields are `Clone` unconditionally),
/// so this only needs `V: Clone`. This is what lets a [`crate::Sentinel`] fan
/// a single outcome out to many waiters without requiring storage/querier
/// error types to be `Clone` themselves.
impl<V, E> Clone for Error<V, E>
where
    V: Debug + Clone,
    E: std::error::Error + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        match self {
            Error::NotFound => Error::NotFound,
            Error::NotSupported => Error::NotSupported,
            Error::Cancelled(reason) => Error::Cancelled(*reason),
            Error::Storage(source) => Error::Storage(source.clone()),
            Error::Query(source) => Error::Query(source.clone()),
            Error::Stale { value, source } => Error::Stale { value: value.clone(), source: source.clone() },
        }
    }
}

/// Blanket impl so `&E` can be probed for kind without an extra reference
/// layer at call sites.
impl<T: NotFoundKind + ?Sized> NotFoundKind for &T {
    fn is_not_found(&self) -> bool {
        (**self).is_not_found()
    }
}

impl<T: ExpiredKind<V> + ?Sized, V> ExpiredKind<V> for &T {
    fn is_expired(&self) -> bool {
        (**self).is_expired()
    }

    fn stale_value(&self) -> Option<V> {
        (**self).stale_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    impl NotFoundKind for Boom {
        fn is_not_found(&self) -> bool {
            false
        }
    }
    impl ExpiredKind<u32> for Boom {
        fn is_expired(&self) -> bool {
            false
        }

        fn stale_value(&self) -> Option<u32> {
            None
        }
    }

    #[test]
    fn opaque_error_is_neither_kind() {
        assert!(!Boom.is_not_found());
        assert!(!ExpiredKind::<u32>::is_expired(&Boom));
    }

    #[test]
    fn not_found_variant_reports_is_not_found() {
        let err: Error<u32, Boom> = Error::NotFound;
        assert!(err.is_not_found());
        let err: Error<u32, Boom> = Error::Storage(Arc::new(Boom));
        assert!(!err.is_not_found());
    }

    #[test]
    fn stale_variant_clones_without_requiring_e_clone() {
        let err: Error<u32, Boom> = Error::Stale { value: 7, source: Arc::new(Boom) };
        let cloned = err.clone();
        assert!(matches!(cloned, Error::Stale { value: 7, .. }));
    }
}
