//! Spindle: a polling-based async task runtime core.
//!
//! Futures here are explicit state machines polled by an executor;
//! there is no language-level `await` integration. The crate provides:
//!
//! - the polling ABI ([`future`]: [`Future`], [`Poll`], [`Waker`],
//!   [`Context`])
//! - a single-threaded cooperative [`Executor`] with strict-priority
//!   scheduling and idempotent wake delivery
//! - a [`Timer`] registry with the composable [`Delay`] and [`Timeout`]
//!   futures
//! - lock-free scheduling primitives ([`scheduler`]: intrusive node
//!   chains, an MPMC injection stack, and SPMC work-stealing rings)
//!   built for a future multi-worker executor
//!
//! # Example
//!
//! ```
//! use spindle::{Executor, Poll};
//! use spindle::future::poll_fn;
//!
//! let mut executor = Executor::new();
//! executor.spawn(poll_fn(|_cx| Poll::Ready(()))).expect("spawn");
//! executor.run().expect("run");
//! assert_eq!(executor.completed_count(), 1);
//! ```
//!
//! The runtime keeps no global state: executors and timers are plain
//! per-instance values.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod future;
pub mod scheduler;
pub mod task;
pub mod test_logging;
pub mod timer;
pub mod tracing_compat;
pub mod types;

pub use config::RuntimeConfig;
pub use error::{Error, ErrorKind};
pub use executor::Executor;
pub use future::{Context, Future, Poll, Waker};
pub use task::{Priority, TaskHandle, TaskState};
pub use timer::{Delay, Elapsed, Timeout, Timer};
pub use types::{TaskId, Time, TimerId};
