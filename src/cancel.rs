//! Cancellation and deadlines.
//!
//! Every blocking operation in this crate — a storage call, a querier call,
//! a [`crate::Sentinel::wait`] — accepts a [`Cancel`] and must honor it. This
//! plays the role the original Go implementation gave `context.Context`,
//! narrowed to the one property the coordinator actually needs: "has someone
//! asked this operation to stop, and if so why."

use parking_lot::{Condvar, Mutex};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Why a wait was abandoned before it could observe a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancelled {
    /// [`Cancel::cancel`] was called.
    Cancelled,
    /// The cancel token's deadline elapsed.
    DeadlineExceeded,
}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cancelled::Cancelled => write!(f, "cancelled"),
            Cancelled::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

impl std::error::Error for Cancelled {}

struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    condvar: Condvar,
    // Only used to pair with `condvar`; the bool payload is unused beyond
    // satisfying `Condvar::wait_while`'s requirement for a guarded value.
    lock: Mutex<()>,
}

/// A cheap, cloneable handle that callers use to signal "stop waiting."
///
/// Cloning a `Cancel` shares the same underlying signal — cancelling any
/// clone cancels all of them, matching how a Go `context.Context` propagates
/// to every holder of a derived context.
#[derive(Clone)]
pub struct Cancel {
    inner: Arc<Inner>,
}

impl Default for Cancel {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancel {
    /// A token that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
                condvar: Condvar::new(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// A token that becomes cancelled once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
                condvar: Condvar::new(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// A token that becomes cancelled after `timeout` elapses from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Signal cancellation to every clone of this token and wake any threads
    /// parked in [`Cancel::wait_while`].
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock();
        self.inner.condvar.notify_all();
    }

    /// Returns why this token is done, or `None` if it's still live.
    pub fn done(&self) -> Option<Cancelled> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Some(Cancelled::Cancelled);
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return Some(Cancelled::DeadlineExceeded);
            }
        }
        None
    }

    /// `true` once this token has been cancelled or its deadline has passed.
    pub fn is_done(&self) -> bool {
        self.done().is_some()
    }

    /// Block the calling thread until `condition` returns `true` or this
    /// token becomes done, whichever happens first. Returns `Err` with the
    /// reason if the token won the race.
    ///
    /// `condition` is re-evaluated on every spurious and every real wakeup,
    /// the same contract `Condvar::wait_while` gives its caller.
    pub fn wait_while(&self, mut condition: impl FnMut() -> bool) -> Result<(), Cancelled> {
        if let Some(reason) = self.done() {
            return Err(reason);
        }

        let mut guard = self.inner.lock.lock();
        loop {
            if !condition() {
                return Ok(());
            }
            if let Some(reason) = self.done() {
                return Err(reason);
            }

            // Poll at a short, bounded interval so a deadline elapsing with
            // no intervening `cancel()` call still wakes us; `cancel()`
            // itself wakes us immediately via `notify_all`.
            let poll = self
                .inner
                .deadline
                .map(|d| d.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_millis(20))
                .min(Duration::from_millis(20));
            let result = self.inner.condvar.wait_for(&mut guard, poll);
            let _ = result;
        }
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("done", &self.is_done())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}
