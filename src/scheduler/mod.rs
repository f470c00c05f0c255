//! Lock-free scheduling primitives.
//!
//! Building blocks for work distribution across workers: the intrusive
//! [`Node`]/[`NodeList`] chain, the shared MPMC [`GlobalQueue`], and the
//! per-worker SPMC [`LocalQueue`] with overflow-to-shared and
//! steal-from-peer. The single-threaded [`Executor`](crate::executor)
//! does not need them yet; they carry the cross-thread semantics a
//! work-stealing executor will sit on.

pub mod global_queue;
pub mod intrusive;
pub mod local_queue;

pub use global_queue::{AcquireError, Consumer, GlobalQueue, QueueStatsSnapshot};
pub use intrusive::{Node, NodeList};
pub use local_queue::{LocalQueue, Overflow, Stealer, Stolen};
