//! The coordinator: read-through lookup with single-flight stampede
//! protection and an optional stale-on-error fallback.
//!
//! `Coordinator<Req, S, Q>` ties a [`Storage`] `S`, a [`Querier`] `Q`, and the
//! in-flight [`Registry`] together. `Req` is the caller-facing key type;
//! through [`CacheKey`] it may differ from `S::Key`, the compact key actually
//! used to index storage and the registry, while the querier still sees the
//! original `Req` (`SPEC_FULL.md` §4.5).

use crate::{
    cancel::Cancel,
    error::Error,
    key::CacheKey,
    querier::Querier,
    registry::{Admission, Registry},
    sentinel::{Producer, WaitError},
    storage::{ClearFn, DelFn, SetWithTtlFn, Storage},
};
use std::{
    fmt::Debug,
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Per-call options for [`Coordinator::get_with`].
pub struct GetOptions<'a, Req, V, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    querier: Option<&'a dyn Querier<Req, V, E>>,
    ttl: Option<Duration>,
}

impl<'a, Req, V, E> Default for GetOptions<'a, Req, V, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn default() -> Self {
        Self { querier: None, ttl: None }
    }
}

/// Builds a [`GetOptions`].
pub struct GetOptionsBuilder<'a, Req, V, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    options: GetOptions<'a, Req, V, E>,
}

impl<'a, Req, V, E> GetOptionsBuilder<'a, Req, V, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Start from the default options (no override querier, no TTL override).
    pub fn new() -> Self {
        Self { options: GetOptions::default() }
    }

    /// Use `querier` instead of the coordinator's default for this call.
    pub fn querier(mut self, querier: &'a dyn Querier<Req, V, E>) -> Self {
        self.options.querier = Some(querier);
        self
    }

    /// Write this call's refreshed value back with `ttl` instead of the
    /// storage's default TTL policy. Fails at call time with
    /// [`Error::NotSupported`] unless the coordinator's storage implements
    /// [`crate::SetWithTtlStorage`] — probed automatically at
    /// [`CoordinatorBuilder::build`], nothing further to opt into.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.options.ttl = Some(ttl);
        self
    }

    /// Finish building.
    pub fn build(self) -> GetOptions<'a, Req, V, E> {
        self.options
    }
}

impl<'a, Req, V, E> Default for GetOptionsBuilder<'a, Req, V, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Read-through + single-flight + stale-on-error orchestrator.
pub struct Coordinator<Req, S, Q>
where
    S: Storage,
    S::Value: Debug,
{
    storage: S,
    querier: Q,
    registry: Registry<S::Key, S::Value, Error<S::Value, S::Error>>,
    use_stale_when_error: AtomicBool,
    del_fn: Option<DelFn<S>>,
    ttl_writer: Option<SetWithTtlFn<S>>,
    clear_fn: Option<ClearFn<S>>,
    _req: PhantomData<fn(Req)>,
}

/// Builds a [`Coordinator`].
///
/// [`CoordinatorBuilder::build`] probes `S`'s optional capabilities by
/// calling [`Storage::capability_del`], [`Storage::capability_set_with_ttl`]
/// and [`Storage::capability_clear`] — each `Some` only if `S`'s own
/// `Storage` impl says so — and stores the result as a small table of
/// function pointers on the built [`Coordinator`]. This happens once, here,
/// rather than being re-checked on every call; nothing further needs opting
/// into.
pub struct CoordinatorBuilder<Req, S, Q>
where
    S: Storage,
{
    storage: S,
    querier: Q,
    use_stale_when_error: bool,
    _req: PhantomData<fn(Req)>,
}

impl<Req, S, Q> CoordinatorBuilder<Req, S, Q>
where
    S: Storage,
    S::Error: crate::error::NotFoundKind + crate::error::ExpiredKind<S::Value>,
    S::Value: Debug,
    Req: CacheKey<StorageKey = S::Key>,
    Q: Querier<Req, S::Value, S::Error>,
{
    /// Start building a coordinator over `storage` with `querier` as its
    /// default query source.
    pub fn new(storage: S, querier: Q) -> Self {
        Self { storage, querier, use_stale_when_error: false, _req: PhantomData }
    }

    /// Enable the stale-on-error policy: if a refresh query fails after an
    /// entry has expired, serve the expired value alongside the error
    /// instead of propagating the error alone. Default: disabled.
    pub fn use_stale_when_error(mut self, enabled: bool) -> Self {
        self.use_stale_when_error = enabled;
        self
    }

    /// Finish building.
    pub fn build(self) -> Coordinator<Req, S, Q> {
        Coordinator {
            del_fn: S::capability_del(),
            ttl_writer: S::capability_set_with_ttl(),
            clear_fn: S::capability_clear(),
            storage: self.storage,
            querier: self.querier,
            registry: Registry::new(),
            use_stale_when_error: AtomicBool::new(self.use_stale_when_error),
            _req: PhantomData,
        }
    }
}

/// Ties a sentinel's termination to its registry entry's removal: the
/// sentinel is always resolved (published to, or abandoned) strictly before
/// the registry entry disappears, closing the late-follower race
/// `SPEC_FULL.md` §9 calls out. Dropping the guard without calling
/// [`LeaderGuard::publish`] abandons the sentinel first — covers a leader
/// that panics mid-query.
struct LeaderGuard<'a, K, V, E> {
    registry: &'a Registry<K, V, E>,
    key: K,
    producer: Option<Producer<V, E>>,
}

impl<'a, K, V, E> LeaderGuard<'a, K, V, E>
where
    K: std::hash::Hash + Eq,
{
    fn new(registry: &'a Registry<K, V, E>, key: K, producer: Producer<V, E>) -> Self {
        Self { registry, key, producer: Some(producer) }
    }

    /// Publish `result` to the sentinel, then remove the registry entry.
    fn publish(mut self, result: Result<V, E>) {
        self.producer.take().expect("published exactly once").publish(result);
    }
}

impl<'a, K, V, E> Drop for LeaderGuard<'a, K, V, E>
where
    K: std::hash::Hash + Eq,
{
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abandon();
        }
        self.registry.remove(&self.key);
    }
}

impl<Req, S, Q> Coordinator<Req, S, Q>
where
    S: Storage,
    S::Error: crate::error::NotFoundKind + crate::error::ExpiredKind<S::Value>,
    S::Value: Clone + Debug,
    Req: CacheKey<StorageKey = S::Key>,
    Q: Querier<Req, S::Value, S::Error>,
{
    /// Look up `key`, consulting storage first and the querier on a miss or
    /// expiry, suppressing duplicate concurrent queries for the same key.
    pub fn get(&self, cancel: &Cancel, key: &Req) -> Result<S::Value, Error<S::Value, S::Error>> {
        self.get_with(cancel, key, GetOptions::default())
    }

    /// Like [`Coordinator::get`], with per-call overrides.
    pub fn get_with(
        &self,
        cancel: &Cancel,
        key: &Req,
        options: GetOptions<'_, Req, S::Value, S::Error>,
    ) -> Result<S::Value, Error<S::Value, S::Error>> {
        if options.ttl.is_some() && self.ttl_writer.is_none() {
            return Err(Error::NotSupported);
        }

        let storage_key = key.cache_key();
        let span = tracing::debug_span!("readthrough.get");
        let _enter = span.enter();

        let mut stale = match self.storage.get(cancel, &storage_key) {
            Ok(value) => {
                tracing::debug!("cache hit");
                return Ok(value);
            }
            Err(err) if err.is_not_found() => None,
            Err(err) if err.is_expired() => err.stale_value(),
            Err(err) => return Err(Error::Storage(Arc::new(err))),
        };

        if let Some(reason) = cancel.done() {
            return Err(Error::Cancelled(reason));
        }

        match self.registry.admit(storage_key.clone()) {
            Admission::Follower(sentinel) => {
                tracing::debug!("joining in-flight query");
                match sentinel.wait(cancel) {
                    Ok(result) => result,
                    Err(wait_err) => Err(wait_err.into()),
                }
            }
            Admission::Leader(producer, _sentinel) => {
                tracing::info!("leading query");
                let guard = LeaderGuard::new(&self.registry, storage_key.clone(), producer);
                self.lead(cancel, key, &storage_key, &mut stale, &options, guard)
            }
        }
    }

    fn lead(
        &self,
        cancel: &Cancel,
        original_key: &Req,
        storage_key: &S::Key,
        stale: &mut Option<S::Value>,
        options: &GetOptions<'_, Req, S::Value, S::Error>,
        guard: LeaderGuard<'_, S::Key, S::Value, Error<S::Value, S::Error>>,
    ) -> Result<S::Value, Error<S::Value, S::Error>> {
        if let Some(reason) = cancel.done() {
            let err = Error::Cancelled(reason);
            guard.publish(Err(err.clone()));
            return Err(err);
        }

        // Double-check: another leader may have completed between the first
        // lookup and single-flight admission.
        match self.storage.get(cancel, storage_key) {
            Ok(value) => {
                guard.publish(Ok(value.clone()));
                return Ok(value);
            }
            Err(err) if err.is_not_found() => {}
            Err(err) if err.is_expired() => {
                if let Some(value) = err.stale_value() {
                    *stale = Some(value);
                }
            }
            Err(err) => {
                let coord_err = Error::Storage(Arc::new(err));
                guard.publish(Err(coord_err.clone()));
                return Err(coord_err);
            }
        }

        if let Some(reason) = cancel.done() {
            let err = Error::Cancelled(reason);
            guard.publish(Err(err.clone()));
            return Err(err);
        }

        let outcome = match options.querier {
            Some(querier) => querier.query(original_key, cancel),
            None => self.querier.query(original_key, cancel),
        };

        // The query step blocks, and a well-behaved querier returns promptly
        // once `cancel` fires, but whatever error it chooses to report isn't
        // necessarily shaped like a cancellation. If cancellation won the
        // race, report it as such rather than whatever the querier returned;
        // a value the querier did manage to produce before losing the race
        // is still honored (below).
        if let (Err(_), Some(reason)) = (&outcome, cancel.done()) {
            let err = Error::Cancelled(reason);
            guard.publish(Err(err.clone()));
            return Err(err);
        }

        match outcome {
            Ok(value) => {
                let write = match options.ttl {
                    Some(ttl) => {
                        let writer = self.ttl_writer.expect("checked before entering get_with");
                        writer(&self.storage, cancel, storage_key, value.clone(), ttl)
                    }
                    None => self.storage.set(cancel, storage_key, value.clone()),
                };
                if let Err(write_err) = write {
                    tracing::warn!(error = %write_err, "storage write-back failed after a successful query");
                }
                guard.publish(Ok(value.clone()));
                Ok(value)
            }
            Err(err) if err.is_not_found() => {
                let coord_err = Error::NotFound;
                guard.publish(Err(coord_err.clone()));
                Err(coord_err)
            }
            Err(err) => {
                if self.use_stale_when_error.load(Ordering::SeqCst) {
                    if let Some(value) = stale.take() {
                        let coord_err = Error::Stale { value, source: Arc::new(err) };
                        guard.publish(Err(coord_err.clone()));
                        return Err(coord_err);
                    }
                }
                let coord_err = Error::Query(Arc::new(err));
                guard.publish(Err(coord_err.clone()));
                Err(coord_err)
            }
        }
    }

    /// Toggle the stale-on-error policy at runtime.
    pub fn use_stale_when_error(&self, enabled: bool) {
        self.use_stale_when_error.store(enabled, Ordering::SeqCst);
    }

    /// Write `value` for `key` directly, bypassing the querier.
    pub fn set(&self, cancel: &Cancel, key: &Req, value: S::Value) -> Result<(), Error<S::Value, S::Error>> {
        self.storage.set(cancel, &key.cache_key(), value).map_err(|e| Error::Storage(Arc::new(e)))
    }

    /// Remove `keys` from storage, at-least-once per key, applying the
    /// cache-key projection to each. Fails with [`Error::NotSupported`],
    /// without touching storage, unless the underlying storage implements
    /// [`crate::DeletableStorage`].
    pub fn del(&self, cancel: &Cancel, keys: &[Req]) -> Result<(), Error<S::Value, S::Error>> {
        let del = match self.del_fn {
            Some(del) => del,
            None => return Err(Error::NotSupported),
        };
        let storage_keys: Vec<S::Key> = keys.iter().map(CacheKey::cache_key).collect();
        del(&self.storage, cancel, &storage_keys).map_err(|e| Error::Storage(Arc::new(e)))
    }

    /// Write `value` for `key`, expiring after `ttl`. Fails with
    /// [`Error::NotSupported`], without touching storage, unless the
    /// underlying storage implements [`crate::SetWithTtlStorage`].
    pub fn set_with_ttl(
        &self,
        cancel: &Cancel,
        key: &Req,
        value: S::Value,
        ttl: Duration,
    ) -> Result<(), Error<S::Value, S::Error>> {
        let writer = match self.ttl_writer {
            Some(writer) => writer,
            None => return Err(Error::NotSupported),
        };
        writer(&self.storage, cancel, &key.cache_key(), value, ttl).map_err(|e| Error::Storage(Arc::new(e)))
    }

    /// Remove every entry from storage. Fails with [`Error::NotSupported`]
    /// unless the underlying storage implements [`crate::ClearableStorage`].
    pub fn clear(&self, cancel: &Cancel) -> Result<(), Error<S::Value, S::Error>> {
        let clear = match self.clear_fn {
            Some(clear) => clear,
            None => return Err(Error::NotSupported),
        };
        clear(&self.storage, cancel).map_err(|e| Error::Storage(Arc::new(e)))
    }
}

impl<V, E> From<WaitError> for Error<V, E>
where
    V: Debug,
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(wait_err: WaitError) -> Self {
        match wait_err {
            WaitError::Cancelled(reason) => Error::Cancelled(reason),
            WaitError::Abandoned => Error::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ClearableStorage, DeletableStorage, SetWithTtlStorage};
    use parking_lot::Mutex;
    use std::{collections::HashMap, sync::atomic::AtomicUsize};

    #[derive(Debug, thiserror::Error)]
    enum MemError {
        #[error("not found")]
        NotFound,
        #[error("expired")]
        Expired(u64),
        #[error("boom")]
        Opaque,
    }

    impl crate::error::NotFoundKind for MemError {
        fn is_not_found(&self) -> bool {
            matches!(self, MemError::NotFound)
        }
    }

    impl crate::error::ExpiredKind<u64> for MemError {
        fn is_expired(&self) -> bool {
            matches!(self, MemError::Expired(_))
        }

        fn stale_value(&self) -> Option<u64> {
            match self {
                MemError::Expired(v) => Some(*v),
                _ => None,
            }
        }
    }

    struct Entry {
        value: u64,
        written_at: std::time::Instant,
    }

    /// A tiny in-memory storage with a fixed TTL, used only to exercise the
    /// coordinator's algorithm in isolation from the real LRU backend.
    struct MemStorage {
        ttl: Option<Duration>,
        entries: Mutex<HashMap<u32, Entry>>,
    }

    impl MemStorage {
        fn new(ttl: Option<Duration>) -> Self {
            Self { ttl, entries: Mutex::new(HashMap::new()) }
        }
    }

    impl Storage for MemStorage {
        type Key = u32;
        type Value = u64;
        type Error = MemError;

        fn get(&self, _cancel: &Cancel, key: &u32) -> Result<u64, MemError> {
            let entries = self.entries.lock();
            let entry = entries.get(key).ok_or(MemError::NotFound)?;
            if let Some(ttl) = self.ttl {
                if entry.written_at.elapsed() >= ttl {
                    return Err(MemError::Expired(entry.value));
                }
            }
            Ok(entry.value)
        }

        fn set(&self, _cancel: &Cancel, key: &u32, value: u64) -> Result<(), MemError> {
            self.entries.lock().insert(*key, Entry { value, written_at: std::time::Instant::now() });
            Ok(())
        }

        fn capability_del() -> Option<crate::storage::DelFn<Self>> {
            Some(Self::del)
        }

        fn capability_set_with_ttl() -> Option<crate::storage::SetWithTtlFn<Self>> {
            Some(Self::set_with_ttl)
        }

        fn capability_clear() -> Option<crate::storage::ClearFn<Self>> {
            Some(Self::clear)
        }
    }

    impl ClearableStorage for MemStorage {
        fn clear(&self, _cancel: &Cancel) -> Result<(), MemError> {
            self.entries.lock().clear();
            Ok(())
        }
    }

    impl DeletableStorage for MemStorage {
        fn del(&self, _cancel: &Cancel, keys: &[u32]) -> Result<(), MemError> {
            let mut entries = self.entries.lock();
            for key in keys {
                entries.remove(key);
            }
            Ok(())
        }
    }

    impl SetWithTtlStorage for MemStorage {
        fn set_with_ttl(&self, _cancel: &Cancel, key: &u32, value: u64, _ttl: Duration) -> Result<(), MemError> {
            self.entries.lock().insert(*key, Entry { value, written_at: std::time::Instant::now() });
            Ok(())
        }
    }

    /// A storage implementing only the base [`Storage`] contract — no
    /// delete, TTL-override, or clear capability — used to exercise
    /// capability gating on an incapable backend.
    struct BareStorage {
        entries: Mutex<HashMap<u32, u64>>,
    }

    impl BareStorage {
        fn new() -> Self {
            Self { entries: Mutex::new(HashMap::new()) }
        }
    }

    impl Storage for BareStorage {
        type Key = u32;
        type Value = u64;
        type Error = MemError;

        fn get(&self, _cancel: &Cancel, key: &u32) -> Result<u64, MemError> {
            self.entries.lock().get(key).copied().ok_or(MemError::NotFound)
        }

        fn set(&self, _cancel: &Cancel, key: &u32, value: u64) -> Result<(), MemError> {
            self.entries.lock().insert(*key, value);
            Ok(())
        }
    }

    #[test]
    fn square_cache_queries_once_then_hits() {
        let calls = AtomicUsize::new(0);
        let querier = |n: &u32, _: &Cancel| -> Result<u64, MemError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok((*n as u64) * (*n as u64))
        };
        let coordinator: Coordinator<u32, _, _> =
            CoordinatorBuilder::new(MemStorage::new(Some(Duration::from_secs(300))), querier).build();
        let cancel = Cancel::new();

        assert_eq!(coordinator.get(&cancel, &100).unwrap(), 10_000);
        assert_eq!(coordinator.get(&cancel, &100).unwrap(), 10_000);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_stampede_queries_exactly_once_per_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_query = calls.clone();
        let querier = move |n: &u32, _: &Cancel| -> Result<u64, MemError> {
            calls_in_query.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
            Ok(*n as u64)
        };
        let coordinator = Arc::new(
            CoordinatorBuilder::<u32, _, _>::new(MemStorage::new(Some(Duration::from_secs(300))), querier).build(),
        );

        std::thread::scope(|scope| {
            for _ in 0..50 {
                let coordinator = coordinator.clone();
                scope.spawn(move || {
                    let cancel = Cancel::new();
                    let value = coordinator.get(&cancel, &7).unwrap();
                    assert_eq!(value, 7);
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expiry_triggers_refresh() {
        let base = Arc::new(AtomicUsize::new(1));
        let base_in_query = base.clone();
        let querier = move |n: &u32, _: &Cancel| -> Result<u64, MemError> {
            Ok((*n as u64) * base_in_query.load(Ordering::SeqCst) as u64)
        };
        let coordinator: Coordinator<u32, _, _> =
            CoordinatorBuilder::new(MemStorage::new(Some(Duration::from_millis(100))), querier).build();
        let cancel = Cancel::new();

        assert_eq!(coordinator.get(&cancel, &1).unwrap(), 1);
        assert_eq!(coordinator.get(&cancel, &1).unwrap(), 1);

        std::thread::sleep(Duration::from_millis(200));
        base.store(2, Ordering::SeqCst);
        assert_eq!(coordinator.get(&cancel, &1).unwrap(), 2);
    }

    #[test]
    fn stale_on_error_serves_old_value_alongside_the_error() {
        let fail = Arc::new(AtomicBool::new(false));
        let fail_in_query = fail.clone();
        let querier = move |_: &u32, _: &Cancel| -> Result<u64, MemError> {
            if fail_in_query.load(Ordering::SeqCst) {
                Err(MemError::Opaque)
            } else {
                Ok(11)
            }
        };
        let coordinator: Coordinator<u32, _, _> =
            CoordinatorBuilder::new(MemStorage::new(Some(Duration::from_nanos(1))), querier)
                .use_stale_when_error(true)
                .build();
        let cancel = Cancel::new();

        assert_eq!(coordinator.get(&cancel, &1).unwrap(), 11);
        std::thread::sleep(Duration::from_millis(5));

        fail.store(true, Ordering::SeqCst);
        let err = coordinator.get(&cancel, &1).unwrap_err();
        match err {
            Error::Stale { value, .. } => assert_eq!(value, 11),
            other => panic!("expected Error::Stale, got {other:?}"),
        }

        fail.store(false, Ordering::SeqCst);
        assert_eq!(coordinator.get(&cancel, &1).unwrap(), 11);
    }

    #[test]
    fn ttl_override_is_rejected_without_capability_and_never_touches_storage() {
        let storage = BareStorage::new();
        let queried = Arc::new(AtomicBool::new(false));
        let queried_in_query = queried.clone();
        let querier = move |n: &u32, _: &Cancel| -> Result<u64, MemError> {
            queried_in_query.store(true, Ordering::SeqCst);
            Ok(*n as u64)
        };
        let coordinator: Coordinator<u32, _, _> = CoordinatorBuilder::new(storage, querier).build();
        let cancel = Cancel::new();

        let options = GetOptionsBuilder::new().ttl(Duration::from_secs(60)).build();
        let err = coordinator.get_with(&cancel, &1, options).unwrap_err();
        assert!(matches!(err, Error::NotSupported));
        assert!(!queried.load(Ordering::SeqCst));
    }

    #[test]
    fn ttl_override_is_accepted_when_storage_supports_it() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_query = calls.clone();
        let querier = move |n: &u32, _: &Cancel| -> Result<u64, MemError> {
            calls_in_query.fetch_add(1, Ordering::SeqCst);
            Ok(*n as u64)
        };
        let coordinator: Coordinator<u32, _, _> =
            CoordinatorBuilder::new(MemStorage::new(Some(Duration::from_secs(300))), querier).build();
        let cancel = Cancel::new();

        let options = GetOptionsBuilder::new().ttl(Duration::from_millis(10)).build();
        assert_eq!(coordinator.get_with(&cancel, &1, options).unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        std::thread::sleep(Duration::from_millis(30));
        // The override TTL (10ms), not the storage's 300s default, governed
        // the write-back: the entry is already expired, so this `get`
        // re-queries instead of hitting the (would-be-300s-fresh) cache.
        assert_eq!(coordinator.get(&cancel, &1).unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn del_and_set_with_ttl_and_clear_are_rejected_without_capability() {
        let querier = |_: &u32, _: &Cancel| -> Result<u64, MemError> { Ok(0) };
        let coordinator: Coordinator<u32, _, _> = CoordinatorBuilder::new(BareStorage::new(), querier).build();
        let cancel = Cancel::new();

        assert!(matches!(coordinator.del(&cancel, &[1, 2]).unwrap_err(), Error::NotSupported));
        assert!(matches!(
            coordinator.set_with_ttl(&cancel, &1, 9, Duration::from_secs(1)).unwrap_err(),
            Error::NotSupported
        ));
        assert!(matches!(coordinator.clear(&cancel).unwrap_err(), Error::NotSupported));
    }

    #[test]
    fn del_set_with_ttl_and_clear_pass_through_when_storage_supports_them() {
        // Every value below is written directly (`set`/`set_with_ttl`), so a
        // querier that always fails still lets a miss after `del`/`clear`
        // show up unambiguously as a fresh, failed query.
        let querier = |_: &u32, _: &Cancel| -> Result<u64, MemError> { Err(MemError::Opaque) };
        let coordinator: Coordinator<u32, _, _> =
            CoordinatorBuilder::new(MemStorage::new(Some(Duration::from_secs(300))), querier).build();
        let cancel = Cancel::new();

        coordinator.set(&cancel, &1, 1).unwrap();
        coordinator.set(&cancel, &2, 2).unwrap();
        coordinator.del(&cancel, &[1]).unwrap();
        assert!(matches!(coordinator.get(&cancel, &1).unwrap_err(), Error::Query(_)));

        coordinator.set_with_ttl(&cancel, &2, 22, Duration::from_secs(300)).unwrap();
        assert_eq!(coordinator.get(&cancel, &2).unwrap(), 22);

        coordinator.clear(&cancel).unwrap();
        assert!(matches!(coordinator.get(&cancel, &2).unwrap_err(), Error::Query(_)));
    }

    #[test]
    fn key_projection_hits_cache_across_distinct_request_objects() {
        struct Request {
            id: u32,
            #[allow(dead_code)]
            label: &'static str,
        }
        impl CacheKey for Request {
            type StorageKey = u32;
            fn cache_key(&self) -> u32 {
                self.id
            }
        }

        let calls = AtomicUsize::new(0);
        let querier = |req: &Request, _: &Cancel| -> Result<u64, MemError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(req.id as u64)
        };
        let coordinator: Coordinator<Request, _, _> =
            CoordinatorBuilder::new(MemStorage::new(Some(Duration::from_secs(300))), querier).build();
        let cancel = Cancel::new();

        let first = Request { id: 10, label: "first" };
        let second = Request { id: 10, label: "second" };
        assert_eq!(coordinator.get(&cancel, &first).unwrap(), 10);
        assert_eq!(coordinator.get(&cancel, &second).unwrap(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
