//! One producer, many waiters: the rendezvous a single in-flight query uses
//! to fan its result out to every caller that stampeded into it.
//!
//! A [`Sentinel`] starts `Pending`. Exactly one [`Producer`] exists per
//! sentinel, created alongside it; only that producer can move the sentinel
//! to its terminal state, via [`Producer::publish`] or [`Producer::abandon`].
//! Both consume the producer by value, so calling either twice is a compile
//! error rather than the runtime "already published" panic the original
//! guarded against with a `sync.Once` (`examples/original_source/sentinel.go`).
//! If a producer is simply dropped without calling either — the leader's
//! goroutine-equivalent panicked, or returned early via `?` — [`Drop`]
//! abandons the sentinel on its behalf, so waiters are never left blocked
//! forever.

use crate::cancel::{Cancel, Cancelled};
use parking_lot::{Condvar, Mutex};
use std::{sync::Arc, time::Duration};

enum State<V, E> {
    Pending,
    Completed(Result<V, E>),
    Abandoned,
}

/// The shared, waitable half of a single in-flight query.
///
/// Handed out as `Arc<Sentinel<V, E>>` so every stampeding caller can hold a
/// clone and call [`Sentinel::wait`] independently. `E` is expected to be
/// cheaply `Clone` — this crate always instantiates sentinels with
/// [`crate::Error`], whose `Clone` impl is cheap regardless of the opaque
/// storage/querier error type it wraps.
pub struct Sentinel<V, E> {
    state: Mutex<State<V, E>>,
    condvar: Condvar,
}

/// How a [`Sentinel::wait`] ended without a value.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The caller's [`Cancel`] token finished first.
    #[error("{0}")]
    Cancelled(#[from] Cancelled),
    /// The producer was dropped without publishing or abandoning explicitly
    /// (typically: the leader's query panicked).
    #[error("the leader abandoned this query without producing a result")]
    Abandoned,
}

impl<V, E> Sentinel<V, E> {
    /// Create a new pending sentinel and its single producer handle.
    pub fn pending() -> (Arc<Self>, Producer<V, E>) {
        let sentinel = Arc::new(Self { state: Mutex::new(State::Pending), condvar: Condvar::new() });
        let producer = Producer { sentinel: sentinel.clone(), armed: true };
        (sentinel, producer)
    }

    /// Block until the producer publishes a result, abandons the query, or
    /// `cancel` finishes first — whichever happens first.
    ///
    /// Returns the leader's result, cloned for this caller; `V: Clone` is
    /// exactly this crate's deep-copy boundary (`SPEC_FULL.md` §5).
    pub fn wait(&self, cancel: &Cancel) -> Result<Result<V, E>, WaitError>
    where
        V: Clone,
        E: Clone,
    {
        if let Some(reason) = cancel.done() {
            return Err(WaitError::Cancelled(reason));
        }

        let mut guard = self.state.lock();
        loop {
            match &*guard {
                State::Completed(result) => return Ok(result.clone()),
                State::Abandoned => return Err(WaitError::Abandoned),
                State::Pending => {}
            }

            if let Some(reason) = cancel.done() {
                return Err(WaitError::Cancelled(reason));
            }

            // Woken immediately by `notify_all` on publish/abandon, or at
            // worst within this bound, so a deadline with no intervening
            // notification is still noticed promptly.
            self.condvar.wait_for(&mut guard, Duration::from_millis(20));
        }
    }

    fn complete(&self, result: Result<V, E>) {
        let mut guard = self.state.lock();
        if matches!(*guard, State::Pending) {
            *guard = State::Completed(result);
        }
        self.condvar.notify_all();
    }

    fn mark_abandoned(&self) {
        let mut guard = self.state.lock();
        if matches!(*guard, State::Pending) {
            *guard = State::Abandoned;
        }
        self.condvar.notify_all();
    }
}

/// The single-use handle that resolves a [`Sentinel`].
///
/// Exists so that "publish" is an operation only the query's leader can
/// perform, and can perform exactly once.
pub struct Producer<V, E> {
    sentinel: Arc<Sentinel<V, E>>,
    armed: bool,
}

impl<V, E> Producer<V, E> {
    /// Resolve the sentinel with the leader's outcome, waking every waiter.
    pub fn publish(mut self, result: Result<V, E>) {
        self.armed = false;
        self.sentinel.complete(result);
    }

    /// Resolve the sentinel as abandoned, waking every waiter with
    /// [`WaitError::Abandoned`]. Safe to call even if the sentinel somehow
    /// already reached a terminal state; only a still-`Pending` sentinel is
    /// affected.
    pub fn abandon(mut self) {
        self.armed = false;
        self.sentinel.mark_abandoned();
    }
}

impl<V, E> Drop for Producer<V, E> {
    fn drop(&mut self) {
        if self.armed {
            self.sentinel.mark_abandoned();
        }
    }
}
