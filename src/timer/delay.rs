//! A future that completes once a deadline passes.

use std::time::Duration;

use crate::future::{Context, Future, Poll};
use crate::types::{Time, TimerId};

use super::Timer;

/// Completes when the timer's clock reaches the deadline.
///
/// Registration happens lazily on the first `Pending` poll and is held
/// at most once per instance: re-polling while pending never creates a
/// second entry, and the registration is cleared on completion or drop.
#[derive(Debug)]
pub struct Delay {
    timer: Timer,
    deadline: Time,
    registration: Option<TimerId>,
}

impl Delay {
    /// A delay that completes at an absolute deadline.
    #[must_use]
    pub fn new(timer: &Timer, deadline: Time) -> Self {
        Self {
            timer: timer.clone(),
            deadline,
            registration: None,
        }
    }

    /// A delay that completes `duration` from now.
    #[must_use]
    pub fn after(timer: &Timer, duration: Duration) -> Self {
        Self::new(timer, timer.deadline_in(duration))
    }

    /// The absolute deadline.
    #[must_use]
    pub const fn deadline(&self) -> Time {
        self.deadline
    }
}

impl Future for Delay {
    type Output = ();

    fn poll(&mut self, cx: &mut Context) -> Poll<()> {
        if self.timer.now() >= self.deadline {
            if let Some(id) = self.registration.take() {
                self.timer.remove(id);
            }
            return Poll::Ready(());
        }
        if self.registration.is_none() {
            match self.timer.register(self.deadline, cx.waker().clone()) {
                Ok(id) => self.registration = Some(id),
                // Degrade to an immediate completion rather than sleep
                // forever with no wake-up registered.
                Err(_) => return Poll::Ready(()),
            }
        }
        Poll::Pending
    }
}

impl Drop for Delay {
    fn drop(&mut self) {
        if let Some(id) = self.registration.take() {
            self.timer.remove(id);
        }
    }
}
