//! Cooperative yield.

use super::{Context, Future, Poll};

/// A future that yields the current task once.
///
/// The first poll wakes its own waker and returns `Pending`, which puts
/// the task back at the end of its priority level; the second poll
/// completes. The executor accepts this self-wake within the same step.
#[derive(Debug, Default)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(&mut self, cx: &mut Context) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake();
            Poll::Pending
        }
    }
}

/// Yields the current task back to the scheduler once.
#[must_use]
pub fn yield_now() -> YieldNow {
    YieldNow::default()
}
