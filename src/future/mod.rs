//! The polling ABI: futures, wakers, and the poll context.
//!
//! A future here is an explicit state machine polled by its owner; there
//! is no language-level `await` integration. Each poll receives a
//! [`Context`] carrying the [`Waker`] to fire when progress becomes
//! possible. Returning [`Poll::Pending`] obliges the future to have
//! arranged that wake-up first, either with a timer registration or by
//! handing the waker to whatever external agent will complete the work.

mod helpers;
mod poll;
mod waker;
mod yield_now;

pub use helpers::{pending, poll_fn, ready, Pending, PollFn, Ready};
pub use poll::Poll;
pub use waker::{Context, Wake, Waker};
pub use yield_now::{yield_now, YieldNow};

/// An asynchronous computation polled to completion.
///
/// `Ready` is a terminal observation: implementations may assume they
/// are not polled again afterwards. A `Pending` poll must not mutate
/// externally observable state beyond registering a single wake-up.
pub trait Future {
    /// The type this future resolves to.
    type Output;

    /// Attempts to make progress.
    fn poll(&mut self, cx: &mut Context) -> Poll<Self::Output>;
}

/// An owned, type-erased future.
///
/// Type-erasure is what lets an executor store heterogeneous futures in
/// one collection; the trait object's destructor doubles as the `drop`
/// half of the future contract.
pub type BoxFuture<T> = Box<dyn Future<Output = T>>;

impl<F: Future + ?Sized> Future for Box<F> {
    type Output = F::Output;

    fn poll(&mut self, cx: &mut Context) -> Poll<Self::Output> {
        (**self).poll(cx)
    }
}

impl<F: Future + ?Sized> Future for &mut F {
    type Output = F::Output;

    fn poll(&mut self, cx: &mut Context) -> Poll<Self::Output> {
        (**self).poll(cx)
    }
}
