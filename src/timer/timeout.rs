//! Timeout: bound a future by a deadline.
//!
//! Races the inner future against the timer's clock. Whichever side
//! finishes first latches the result; the losing side is torn down.
//! In particular, the inner future is dropped the moment the deadline
//! fires, so resources it holds (including its own timer registrations)
//! are released promptly.

use std::time::Duration;

use crate::future::{Context, Future, Poll};
use crate::types::{Time, TimerId};

use super::{Elapsed, Timer};

/// A future bounded by an absolute deadline.
///
/// Resolves to `Ok(value)` if the inner future completes first, or
/// `Err(Elapsed)` once the deadline passes. After either outcome the
/// timeout is latched: further polls return `Pending` and have no
/// effect (a caller that polls past completion gets nothing more).
#[derive(Debug)]
pub struct Timeout<F> {
    inner: Option<F>,
    timer: Timer,
    deadline: Time,
    registration: Option<TimerId>,
    completed: bool,
}

impl<F> Timeout<F> {
    /// Bounds `inner` by an absolute deadline.
    #[must_use]
    pub fn new(timer: &Timer, deadline: Time, inner: F) -> Self {
        Self {
            inner: Some(inner),
            timer: timer.clone(),
            deadline,
            registration: None,
            completed: false,
        }
    }

    /// Bounds `inner` by a deadline `duration` from now.
    #[must_use]
    pub fn after(timer: &Timer, duration: Duration, inner: F) -> Self {
        let deadline = timer.deadline_in(duration);
        Self::new(timer, deadline, inner)
    }

    /// The absolute deadline.
    #[must_use]
    pub const fn deadline(&self) -> Time {
        self.deadline
    }

    fn complete(&mut self) {
        self.completed = true;
        self.inner = None;
        if let Some(id) = self.registration.take() {
            self.timer.remove(id);
        }
    }
}

impl<F: Future> Future for Timeout<F> {
    type Output = Result<F::Output, Elapsed>;

    fn poll(&mut self, cx: &mut Context) -> Poll<Self::Output> {
        if self.completed {
            return Poll::Pending;
        }
        if self.timer.now() >= self.deadline {
            self.complete();
            return Poll::Ready(Err(Elapsed::new(self.deadline)));
        }

        let inner_poll = match self.inner.as_mut() {
            Some(inner) => inner.poll(cx),
            None => return Poll::Pending,
        };
        match inner_poll {
            Poll::Ready(value) => {
                self.complete();
                Poll::Ready(Ok(value))
            }
            Poll::Pending => {
                if self.registration.is_none() {
                    match self.timer.register(self.deadline, cx.waker().clone()) {
                        Ok(id) => self.registration = Some(id),
                        Err(_) => {
                            // No wake-up can be arranged; fail the race
                            // now instead of pending forever.
                            self.complete();
                            return Poll::Ready(Err(Elapsed::new(self.deadline)));
                        }
                    }
                }
                Poll::Pending
            }
        }
    }
}

impl<F> Drop for Timeout<F> {
    fn drop(&mut self) {
        if let Some(id) = self.registration.take() {
            self.timer.remove(id);
        }
    }
}
