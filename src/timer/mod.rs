//! Deadline registry and the time-bounded futures built on it.
//!
//! The [`Timer`] keeps an unsorted list of `(deadline, waker)` entries
//! and wakes every registered party whose deadline has passed when
//! [`process_expired`](Timer::process_expired) runs. The unsorted list
//! is deliberate: the live entry count is bounded by the number of
//! in-flight [`Delay`]/[`Timeout`] futures, and the expiry pass is O(n)
//! regardless, so a heap buys nothing at this scale.
//!
//! `Timer` is a cheap clonable handle; the futures it hands out hold a
//! clone, so the registry lives as long as anything still depends on it.

mod delay;
mod elapsed;
mod timeout;

pub use delay::Delay;
pub use elapsed::Elapsed;
pub use timeout::Timeout;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::Error;
use crate::future::Waker;
use crate::tracing_compat::trace;
use crate::types::{Clock, Time, TimerId};

#[derive(Debug)]
struct TimerEntry {
    id: TimerId,
    deadline: Time,
    waker: Waker,
}

#[derive(Debug)]
struct TimerInner {
    entries: Vec<TimerEntry>,
    next_id: u64,
}

/// A registry of deadlines and the wakers to fire when they pass.
#[derive(Debug, Clone)]
pub struct Timer {
    inner: Arc<Mutex<TimerInner>>,
    clock: Clock,
}

impl Timer {
    /// Creates an empty timer with its own monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TimerInner {
                entries: Vec::new(),
                next_id: 1,
            })),
            clock: Clock::new(),
        }
    }

    /// Current reading of the timer's clock.
    #[must_use]
    pub fn now(&self) -> Time {
        self.clock.now()
    }

    /// Absolute deadline `duration` from now.
    #[must_use]
    pub fn deadline_in(&self, duration: Duration) -> Time {
        self.now() + duration
    }

    /// Registers a waker to fire once `deadline` passes.
    ///
    /// Returns the registration id used for [`remove`](Self::remove).
    /// Fails only when the entry cannot be allocated.
    pub fn register(&self, deadline: Time, waker: Waker) -> Result<TimerId, Error> {
        let mut inner = self.inner.lock();
        inner.entries.try_reserve(1)?;
        let id = TimerId::new(inner.next_id);
        inner.next_id += 1;
        inner.entries.push(TimerEntry {
            id,
            deadline,
            waker,
        });
        trace!(timer_id = %id, deadline = ?deadline, "timer registered");
        Ok(id)
    }

    /// Removes a registration. Silent if the id is unknown, so cleanup
    /// paths can run unconditionally.
    pub fn remove(&self, id: TimerId) {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.entries.iter().position(|e| e.id == id) {
            inner.entries.swap_remove(pos);
            trace!(timer_id = %id, "timer removed");
        }
    }

    /// Wakes and removes every entry whose deadline has passed.
    ///
    /// `now` is snapshotted once at entry; ordering among expired
    /// entries is arbitrary. Returns the number of wakers fired.
    pub fn process_expired(&self) -> usize {
        let now = self.clock.now();
        let mut fired: SmallVec<[Waker; 8]> = SmallVec::new();
        {
            let mut inner = self.inner.lock();
            let mut i = 0;
            while i < inner.entries.len() {
                if inner.entries[i].deadline <= now {
                    // swap_remove moves the last entry into slot i; the
                    // loop re-examines that index before advancing.
                    let entry = inner.entries.swap_remove(i);
                    trace!(timer_id = %entry.id, "timer expired");
                    fired.push(entry.waker);
                } else {
                    i += 1;
                }
            }
        }
        // Fire outside the lock: a waker is allowed to re-enter the
        // timer (e.g. to register a follow-up deadline).
        let count = fired.len();
        for waker in fired {
            waker.wake();
        }
        count
    }

    /// Earliest registered deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        let inner = self.inner.lock();
        inner.entries.iter().map(|e| e.deadline).min()
    }

    /// Returns true if some entry's deadline has already passed.
    #[must_use]
    pub fn has_expired(&self) -> bool {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner.entries.iter().any(|e| e.deadline <= now)
    }

    /// Number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if no registrations are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::Wake;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingWake(AtomicUsize);

    impl Wake for CountingWake {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_waker() -> (Arc<CountingWake>, Waker) {
        let target = Arc::new(CountingWake(AtomicUsize::new(0)));
        let waker = Waker::from_wake(Arc::clone(&target) as Arc<dyn Wake>);
        (target, waker)
    }

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn ids_are_strictly_increasing_from_one() {
        init_test("ids_are_strictly_increasing_from_one");
        let timer = Timer::new();
        let a = timer
            .register(Time::from_secs(1), Waker::noop())
            .expect("register");
        let b = timer
            .register(Time::from_secs(2), Waker::noop())
            .expect("register");
        crate::assert_with_log!(a.as_u64() == 1, "first id", 1u64, a.as_u64());
        crate::assert_with_log!(b.as_u64() == 2, "second id", 2u64, b.as_u64());
        crate::test_complete!("ids_are_strictly_increasing_from_one");
    }

    #[test]
    fn process_expired_wakes_only_due_entries() {
        init_test("process_expired_wakes_only_due_entries");
        let timer = Timer::new();
        let (due, due_waker) = counting_waker();
        let (later, later_waker) = counting_waker();

        let now = timer.now();
        timer
            .register(now - Duration::from_millis(1), due_waker)
            .expect("register");
        timer
            .register(now + Duration::from_secs(60), later_waker)
            .expect("register");

        crate::test_section!("expire");
        let fired = timer.process_expired();
        crate::assert_with_log!(fired == 1, "one entry fired", 1usize, fired);
        crate::assert_with_log!(
            due.0.load(Ordering::SeqCst) == 1,
            "due waker fired once",
            1usize,
            due.0.load(Ordering::SeqCst)
        );
        crate::assert_with_log!(
            later.0.load(Ordering::SeqCst) == 0,
            "later waker untouched",
            0usize,
            later.0.load(Ordering::SeqCst)
        );
        crate::assert_with_log!(timer.len() == 1, "later entry remains", 1usize, timer.len());
        crate::test_complete!("process_expired_wakes_only_due_entries");
    }

    #[test]
    fn process_expired_handles_swapped_in_entries() {
        init_test("process_expired_handles_swapped_in_entries");
        let timer = Timer::new();
        let now = timer.now();
        // Alternate due / not-due so swap_remove repeatedly swaps a due
        // entry into the scanned slot.
        let mut counters = Vec::new();
        for i in 0..8 {
            let (counter, waker) = counting_waker();
            let deadline = if i % 2 == 0 {
                now - Duration::from_millis(1)
            } else {
                now + Duration::from_secs(60)
            };
            timer.register(deadline, waker).expect("register");
            counters.push((counter, i % 2 == 0));
        }

        let fired = timer.process_expired();
        crate::assert_with_log!(fired == 4, "all due entries fired", 4usize, fired);
        for (counter, was_due) in counters {
            let hits = counter.0.load(Ordering::SeqCst);
            let expected = usize::from(was_due);
            crate::assert_with_log!(hits == expected, "exactly-once firing", expected, hits);
        }
        crate::assert_with_log!(timer.len() == 4, "not-due entries remain", 4usize, timer.len());
        crate::test_complete!("process_expired_handles_swapped_in_entries");
    }

    #[test]
    fn remove_is_idempotent() {
        init_test("remove_is_idempotent");
        let timer = Timer::new();
        let id = timer
            .register(Time::from_secs(5), Waker::noop())
            .expect("register");
        timer.remove(id);
        timer.remove(id);
        crate::assert_with_log!(timer.is_empty(), "registry empty", true, timer.is_empty());
        crate::test_complete!("remove_is_idempotent");
    }

    #[test]
    fn next_deadline_is_the_minimum() {
        init_test("next_deadline_is_the_minimum");
        let timer = Timer::new();
        assert!(timer.next_deadline().is_none());

        timer
            .register(Time::from_millis(200), Waker::noop())
            .expect("register");
        timer
            .register(Time::from_millis(100), Waker::noop())
            .expect("register");
        timer
            .register(Time::from_millis(150), Waker::noop())
            .expect("register");

        crate::assert_with_log!(
            timer.next_deadline() == Some(Time::from_millis(100)),
            "earliest deadline wins",
            Some(Time::from_millis(100)),
            timer.next_deadline()
        );
        crate::test_complete!("next_deadline_is_the_minimum");
    }

    #[test]
    fn has_expired_tracks_the_clock() {
        init_test("has_expired_tracks_the_clock");
        let timer = Timer::new();
        assert!(!timer.has_expired());

        timer
            .register(timer.now() - Duration::from_millis(1), Waker::noop())
            .expect("register");
        assert!(timer.has_expired());

        timer.process_expired();
        assert!(!timer.has_expired());
        crate::test_complete!("has_expired_tracks_the_clock");
    }

    #[test]
    fn waker_may_reenter_the_timer() {
        init_test("waker_may_reenter_the_timer");
        let timer = Timer::new();

        struct Reregister {
            timer: Timer,
        }
        impl Wake for Reregister {
            fn wake(&self) {
                let _ = self
                    .timer
                    .register(self.timer.now() + Duration::from_secs(60), Waker::noop());
            }
        }

        let waker = Waker::from_wake(Arc::new(Reregister {
            timer: timer.clone(),
        }) as Arc<dyn Wake>);
        timer
            .register(timer.now() - Duration::from_millis(1), waker)
            .expect("register");

        let fired = timer.process_expired();
        crate::assert_with_log!(fired == 1, "expired entry fired", 1usize, fired);
        crate::assert_with_log!(timer.len() == 1, "follow-up registered", 1usize, timer.len());
        crate::test_complete!("waker_may_reenter_the_timer");
    }
}
