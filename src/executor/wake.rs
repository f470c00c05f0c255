//! Wake bookkeeping with deduplication.
//!
//! Wakers handed to tasks do not touch the executor directly; they
//! record the task id in a shared [`WakeSet`] that the executor drains
//! at step boundaries. That one indirection makes every wake path
//! uniform and safe: a task waking itself mid-poll, the timer firing
//! from `process_expired`, or an external thread firing a stored waker
//! all land in the same set, and duplicate fires collapse into one
//! entry.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::future::{Wake, Waker};
use crate::tracing_compat::trace;
use crate::types::TaskId;

/// Source attribution for wake events, for causality in trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSource {
    /// Woken by a timer expiry.
    Timer,
    /// Woken explicitly by user code or another task.
    Explicit,
    /// Wake source not specified.
    Unknown,
}

impl WakeSource {
    const fn label(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Explicit => "explicit",
            Self::Unknown => "unknown",
        }
    }
}

/// The set of task ids woken since the last drain.
#[derive(Debug, Default)]
pub struct WakeSet {
    woken: Mutex<HashSet<TaskId>>,
}

impl WakeSet {
    /// Creates an empty wake set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a waker that records `task` with unknown attribution.
    #[must_use]
    pub fn waker_for(self: &Arc<Self>, task: TaskId) -> Waker {
        self.waker_for_source(task, WakeSource::Unknown)
    }

    /// Creates a waker that records `task` with the given attribution.
    #[must_use]
    pub fn waker_for_source(self: &Arc<Self>, task: TaskId, source: WakeSource) -> Waker {
        Waker::from_wake(Arc::new(TaskWaker {
            set: Arc::clone(self),
            task,
            source,
        }))
    }

    /// Removes and returns all woken task ids.
    pub fn drain(&self) -> Vec<TaskId> {
        let mut woken = self.woken.lock();
        woken.drain().collect()
    }

    /// Returns true if any task has been woken since the last drain.
    #[must_use]
    pub fn has_woken(&self) -> bool {
        !self.woken.lock().is_empty()
    }

    fn insert(&self, task: TaskId, source: WakeSource) {
        let mut woken = self.woken.lock();
        if woken.insert(task) {
            trace!(task_id = %task, wake_source = source.label(), "task woken");
        }
    }
}

/// A waker bound to one task id.
struct TaskWaker {
    set: Arc<WakeSet>,
    task: TaskId,
    source: WakeSource,
}

impl Wake for TaskWaker {
    fn wake(&self) {
        self.set.insert(self.task, self.source);
    }
}
