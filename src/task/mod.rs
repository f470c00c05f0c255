//! Scheduler-visible task records.
//!
//! A [`Task`] owns exactly one type-erased unit future plus the state the
//! executor needs to schedule it: identity, lifecycle state, and
//! priority. Futures with a non-unit output are adapted by discarding
//! the value; surfacing results (and the [`Failed`](TaskState::Failed)
//! state that would report them) is a planned extension.

use core::fmt;

use crate::future::{BoxFuture, Context, Future, Poll};
use crate::types::TaskId;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Queued for polling.
    Ready,
    /// Waiting for a wake-up.
    Pending,
    /// Currently being polled.
    Running,
    /// Finished; the future returned `Ready`.
    Completed,
    /// Finished with an error. Not yet produced by the runtime.
    Failed,
}

impl TaskState {
    /// Returns true for states a task never leaves.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Scheduling priority. Higher wins; ties run in spawn/wake order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// Background work.
    Low,
    /// The default.
    #[default]
    Normal,
    /// Ahead of normal work.
    High,
    /// Ahead of everything.
    Critical,
}

impl Priority {
    /// Ordinal rank, higher = more urgent.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

/// Handle returned by spawn, carrying the task's identity.
///
/// Future extensions may grow cancel/join operations here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    id: TaskId,
}

impl TaskHandle {
    pub(crate) const fn new(id: TaskId) -> Self {
        Self { id }
    }

    /// The id of the spawned task.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }
}

/// One schedulable unit of work: an erased unit future plus scheduler
/// bookkeeping.
pub struct Task {
    id: TaskId,
    state: TaskState,
    priority: Priority,
    future: BoxFuture<()>,
}

impl Task {
    /// Wraps a unit future into a task. Starts `Ready` at `Normal`
    /// priority.
    pub fn new<F>(id: TaskId, future: F) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        Self {
            id,
            state: TaskState::Ready,
            priority: Priority::Normal,
            future: Box::new(future),
        }
    }

    /// Wraps any future into a task, discarding its output.
    pub fn from_future<F>(id: TaskId, future: F) -> Self
    where
        F: Future + 'static,
    {
        Self::new(id, DiscardOutput { inner: future })
    }

    /// The task's id.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// The task's current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// The task's scheduling priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub(crate) fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    /// Polls the owned future.
    pub fn poll(&mut self, cx: &mut Context) -> Poll<()> {
        self.future.poll(cx)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Adapter that maps any future's output to `()`.
struct DiscardOutput<F> {
    inner: F,
}

impl<F: Future> Future for DiscardOutput<F> {
    type Output = ();

    fn poll(&mut self, cx: &mut Context) -> Poll<()> {
        self.inner.poll(cx).map(|_| ())
    }
}
