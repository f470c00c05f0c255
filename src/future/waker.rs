//! Wakers and the poll context.
//!
//! A [`Waker`] is a bound callable: invoking [`wake`](Waker::wake) calls
//! the underlying [`Wake`] implementation exactly as it was provided.
//! Wakers are cheap to clone (one reference-count increment), may be
//! stored anywhere, and dropping one never fires it. Idempotence of
//! delivery is the executor's concern, not the waker's: a waker may
//! fire any number of times.

use core::fmt;
use std::sync::Arc;

/// The wake capability: something that can schedule a suspended party.
pub trait Wake: Send + Sync {
    /// Signals that the associated party can make progress.
    fn wake(&self);
}

/// A clonable handle that wakes one suspended party when invoked.
pub struct Waker {
    inner: Arc<dyn Wake>,
}

impl Waker {
    /// Wraps a [`Wake`] implementation.
    #[must_use]
    pub fn from_wake(inner: Arc<dyn Wake>) -> Self {
        Self { inner }
    }

    /// A waker that does nothing when fired.
    ///
    /// Useful for polling a future whose wake-up path is irrelevant,
    /// e.g. a deadline already known to have passed.
    #[must_use]
    pub fn noop() -> Self {
        struct Noop;
        impl Wake for Noop {
            fn wake(&self) {}
        }
        Self {
            inner: Arc::new(Noop),
        }
    }

    /// Fires the waker.
    pub fn wake(&self) {
        self.inner.wake();
    }

    /// Returns true if both handles wake the same underlying party.
    #[must_use]
    pub fn will_wake(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Clone for Waker {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Waker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waker").finish_non_exhaustive()
    }
}

/// The context passed into every poll.
///
/// Currently a thin carrier of the current [`Waker`]; the type is kept
/// separate from the waker so the poll signature stays stable if more
/// per-poll state (deadline hint, budget counter) is added later.
#[derive(Debug, Clone)]
pub struct Context {
    waker: Waker,
}

impl Context {
    /// Creates a context carrying the given waker.
    #[must_use]
    pub fn from_waker(waker: Waker) -> Self {
        Self { waker }
    }

    /// Returns the waker the polled future should register for wake-up.
    #[must_use]
    pub fn waker(&self) -> &Waker {
        &self.waker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingWake {
        fired: AtomicUsize,
    }

    impl Wake for CountingWake {
        fn wake(&self) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wake_invokes_the_bound_callable() {
        let target = Arc::new(CountingWake {
            fired: AtomicUsize::new(0),
        });
        let waker = Waker::from_wake(Arc::clone(&target) as Arc<dyn Wake>);

        waker.wake();
        waker.wake();
        assert_eq!(target.fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_a_waker_never_fires() {
        let target = Arc::new(CountingWake {
            fired: AtomicUsize::new(0),
        });
        {
            let waker = Waker::from_wake(Arc::clone(&target) as Arc<dyn Wake>);
            let clone = waker.clone();
            drop(clone);
            drop(waker);
        }
        assert_eq!(target.fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clones_wake_the_same_party() {
        let target = Arc::new(CountingWake {
            fired: AtomicUsize::new(0),
        });
        let waker = Waker::from_wake(Arc::clone(&target) as Arc<dyn Wake>);
        let clone = waker.clone();

        assert!(waker.will_wake(&clone));
        assert!(!waker.will_wake(&Waker::noop()));

        clone.wake();
        assert_eq!(target.fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn context_carries_the_waker() {
        let target = Arc::new(CountingWake {
            fired: AtomicUsize::new(0),
        });
        let cx = Context::from_waker(Waker::from_wake(Arc::clone(&target) as Arc<dyn Wake>));

        cx.waker().wake();
        assert_eq!(target.fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_waker_is_inert() {
        let waker = Waker::noop();
        waker.wake();
        waker.wake();
    }
}
