//! Single-threaded cooperative executor.
//!
//! Tasks run to their next `Pending` or `Ready`; there is no
//! preemption. The ready set is a binary heap ordered by strict
//! priority, with an insertion generation as tie-break so tasks of
//! equal priority run in spawn/wake order. Pending tasks stay in the
//! task table until a wake moves them back to ready.
//!
//! Wake-ups arrive through the shared [`WakeSet`], drained at the start
//! and end of every step, so a task that wakes itself mid-poll is
//! ready again within the same step, and tasks woken by
//! [`Timer::process_expired`](crate::timer::Timer::process_expired) are
//! in the ready set before the next step runs.
//!
//! A poll that panics propagates out of [`step`](Executor::step);
//! isolating task panics is left to a future extension together with
//! the [`TaskState::Failed`] reporting path.

mod wake;

pub use wake::{WakeSet, WakeSource};

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::{Error, ErrorKind};
use crate::future::{Context, Future, Poll, Waker};
use crate::task::{Priority, Task, TaskHandle, TaskState};
use crate::tracing_compat::{debug, trace};
use crate::types::TaskId;

/// Ready-set entry: higher priority first, then earlier generation
/// (FIFO within the same priority).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadyEntry {
    task: TaskId,
    priority: Priority,
    generation: u64,
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap: compare priority naturally and
        // invert the generation comparison.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Drives tasks to completion by polling them.
#[derive(Debug)]
pub struct Executor {
    tasks: HashMap<TaskId, Task>,
    ready: BinaryHeap<ReadyEntry>,
    /// One cached waker per live task, built on first need and dropped
    /// with the task. Clones held elsewhere (timer entries, user code)
    /// stay valid; firing one after completion records an id the
    /// executor no longer knows, which `wake` ignores.
    wakers: HashMap<TaskId, Waker>,
    wake_set: Arc<WakeSet>,
    next_task_id: u64,
    next_generation: u64,
    completed: u64,
    running: bool,
}

impl Executor {
    /// Creates an executor with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    /// Creates an executor with the given configuration.
    #[must_use]
    pub fn with_config(config: &RuntimeConfig) -> Self {
        let capacity = config.executor.initial_task_capacity;
        Self {
            tasks: HashMap::with_capacity(capacity),
            ready: BinaryHeap::with_capacity(capacity),
            wakers: HashMap::with_capacity(capacity),
            wake_set: Arc::new(WakeSet::new()),
            next_task_id: 1,
            next_generation: 0,
            completed: 0,
            running: false,
        }
    }

    /// Spawns a future at [`Priority::Normal`].
    pub fn spawn<F>(&mut self, future: F) -> Result<TaskHandle, Error>
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawn_with_priority(future, Priority::Normal)
    }

    /// Spawns a future at the given priority.
    ///
    /// The task starts in the ready set; nothing runs until
    /// [`run`](Self::run) or [`step`](Self::step).
    pub fn spawn_with_priority<F>(
        &mut self,
        future: F,
        priority: Priority,
    ) -> Result<TaskHandle, Error>
    where
        F: Future<Output = ()> + 'static,
    {
        self.tasks.try_reserve(1)?;
        self.wakers.try_reserve(1)?;
        self.ready.try_reserve(1)?;

        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;

        let mut task = Task::new(id, future);
        task.set_priority(priority);
        self.tasks.insert(id, task);
        self.push_ready(id, priority);
        trace!(task_id = %id, priority = ?priority, "task spawned");
        Ok(TaskHandle::new(id))
    }

    /// Moves a pending task to the ready set.
    ///
    /// Idempotent: waking a task that is already ready, currently
    /// running, or gone is a silent no-op, so double-fired wakers and
    /// stale ids are harmless. A woken task appears in the ready set
    /// exactly once.
    pub fn wake(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if task.state() != TaskState::Pending {
            return;
        }
        task.set_state(TaskState::Ready);
        let priority = task.priority();
        self.push_ready(id, priority);
        trace!(task_id = %id, "task moved to ready");
    }

    /// Runs one scheduling step: polls the highest-priority ready task.
    ///
    /// Returns whether ready work remains.
    pub fn step(&mut self) -> bool {
        self.drain_wake_set();

        let Some(entry) = self.ready.pop() else {
            return false;
        };
        // A stale entry (task no longer Ready) is skipped, not polled.
        let current = self
            .tasks
            .get(&entry.task)
            .is_some_and(|task| task.state() == TaskState::Ready);
        if !current {
            return !self.ready.is_empty();
        }

        let waker = self.waker_for(entry.task);
        let mut cx = Context::from_waker(waker);

        let poll = match self.tasks.get_mut(&entry.task) {
            Some(task) => {
                task.set_state(TaskState::Running);
                trace!(task_id = %entry.task, "polling task");
                task.poll(&mut cx)
            }
            None => return !self.ready.is_empty(),
        };

        match poll {
            Poll::Ready(()) => {
                if let Some(mut task) = self.tasks.remove(&entry.task) {
                    task.set_state(TaskState::Completed);
                }
                self.wakers.remove(&entry.task);
                self.completed += 1;
                trace!(task_id = %entry.task, "task completed");
            }
            Poll::Pending => {
                if let Some(task) = self.tasks.get_mut(&entry.task) {
                    task.set_state(TaskState::Pending);
                }
            }
        }

        // A self-wake during the poll must land in this same step.
        self.drain_wake_set();
        !self.ready.is_empty()
    }

    /// Runs until the ready set is empty.
    ///
    /// Tasks still pending at that point simply stay in the table;
    /// dropping the executor drops their futures and wakers. Fails with
    /// [`ErrorKind::AlreadyRunning`] on re-entry.
    pub fn run(&mut self) -> Result<(), Error> {
        if self.running {
            return Err(Error::new(ErrorKind::AlreadyRunning));
        }
        self.running = true;
        debug!("executor run loop started");
        while self.step() {}
        self.running = false;
        debug!(
            completed = self.completed,
            pending = self.pending_count(),
            "executor run loop drained"
        );
        Ok(())
    }

    /// Number of tasks currently in the ready state.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.state() == TaskState::Ready)
            .count()
    }

    /// Number of tasks waiting for a wake-up.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.state() == TaskState::Pending)
            .count()
    }

    /// Tasks completed over the executor's lifetime.
    #[must_use]
    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    /// Returns true if no tasks are live (ready, running, or pending).
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Current lifecycle state of a task, if it is still live.
    #[must_use]
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(&id).map(Task::state)
    }

    fn push_ready(&mut self, task: TaskId, priority: Priority) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.ready.push(ReadyEntry {
            task,
            priority,
            generation,
        });
    }

    fn waker_for(&mut self, task: TaskId) -> Waker {
        if let Some(waker) = self.wakers.get(&task) {
            return waker.clone();
        }
        let waker = self.wake_set.waker_for(task);
        self.wakers.insert(task, waker.clone());
        waker
    }

    fn drain_wake_set(&mut self) {
        if !self.wake_set.has_woken() {
            return;
        }
        for id in self.wake_set.drain() {
            self.wake(id);
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}
