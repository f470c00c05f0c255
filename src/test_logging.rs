//! Test logging infrastructure.
//!
//! Captures typed runtime events with timestamps during tests so that a
//! failing assertion can dump the full event history instead of a bare
//! panic message.
//!
//! # Overview
//!
//! - [`TestLogLevel`]: configurable verbosity (via `TEST_LOG_LEVEL`)
//! - [`TestEvent`]: typed events for runtime operations
//! - [`TestLogger`]: captures and reports events
//!
//! The crate-root macros (`test_phase!`, `test_section!`,
//! `test_complete!`, `assert_with_log!`) emit structured tracing
//! records; the logger-based macros (`test_log!`, `assert_log!`, …)
//! capture into a [`TestLogger`] for post-mortem reports.

use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::Instant;

/// Logging verbosity level for tests.
///
/// Ordered least to most verbose: `Error < Warn < Info < Debug < Trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TestLogLevel {
    /// Only errors and failures.
    Error,
    /// Warnings and above.
    Warn,
    /// General test progress.
    #[default]
    Info,
    /// Detailed scheduler and timer operations.
    Debug,
    /// All events including individual polls and wakes.
    Trace,
}

impl TestLogLevel {
    /// Human-readable name for the level.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Reads the level from the `TEST_LOG_LEVEL` environment variable.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("TEST_LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for TestLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TestLogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

/// A typed runtime event captured during a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestEvent {
    /// A task was spawned.
    TaskSpawn {
        /// The spawned task.
        task_id: u64,
    },
    /// A task was polled.
    TaskPoll {
        /// The polled task.
        task_id: u64,
        /// True if the poll returned ready.
        ready: bool,
    },
    /// A task was woken.
    TaskWake {
        /// The woken task.
        task_id: u64,
    },
    /// A task completed.
    TaskComplete {
        /// The completed task.
        task_id: u64,
    },
    /// A timer registration was created.
    TimerRegister {
        /// The registration id.
        timer_id: u64,
    },
    /// A timer entry expired and fired.
    TimerFire {
        /// The registration id.
        timer_id: u64,
    },
    /// Nodes were pushed to a queue.
    QueuePush {
        /// How many nodes.
        count: usize,
    },
    /// Nodes were stolen from a peer.
    QueueSteal {
        /// How many nodes.
        count: usize,
    },
    /// Free-form progress message.
    Custom {
        /// Event category.
        category: &'static str,
        /// Message text.
        message: String,
    },
    /// Warning-level message.
    Warn {
        /// Event category.
        category: &'static str,
        /// Message text.
        message: String,
    },
    /// Error-level message.
    Error {
        /// Event category.
        category: &'static str,
        /// Message text.
        message: String,
    },
}

impl TestEvent {
    /// The minimum level at which this event is captured.
    #[must_use]
    pub const fn level(&self) -> TestLogLevel {
        match self {
            Self::Error { .. } => TestLogLevel::Error,
            Self::Warn { .. } => TestLogLevel::Warn,
            Self::TaskSpawn { .. } | Self::TaskComplete { .. } | Self::Custom { .. } => {
                TestLogLevel::Info
            }
            Self::TimerRegister { .. } | Self::TimerFire { .. } | Self::QueuePush { .. }
            | Self::QueueSteal { .. } => TestLogLevel::Debug,
            Self::TaskPoll { .. } | Self::TaskWake { .. } => TestLogLevel::Trace,
        }
    }
}

#[derive(Debug, Clone)]
struct TimedEvent {
    at_micros: u128,
    event: TestEvent,
}

/// Captures timestamped events and renders a report on demand.
#[derive(Debug)]
pub struct TestLogger {
    level: TestLogLevel,
    start: Instant,
    events: Mutex<Vec<TimedEvent>>,
}

impl TestLogger {
    /// Creates a logger capturing events at or below `level`.
    #[must_use]
    pub fn new(level: TestLogLevel) -> Self {
        Self {
            level,
            start: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Creates a logger at the level given by `TEST_LOG_LEVEL`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(TestLogLevel::from_env())
    }

    /// Records an event if its level is enabled.
    pub fn log(&self, event: TestEvent) {
        if event.level() > self.level {
            return;
        }
        let at_micros = self.start.elapsed().as_micros();
        self.events
            .lock()
            .expect("test logger lock poisoned")
            .push(TimedEvent { at_micros, event });
    }

    /// Number of captured events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("test logger lock poisoned").len()
    }

    /// Returns true if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts captured events matching a predicate.
    pub fn count_matching<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&TestEvent) -> bool,
    {
        self.events
            .lock()
            .expect("test logger lock poisoned")
            .iter()
            .filter(|record| predicate(&record.event))
            .count()
    }

    /// Renders the full captured history.
    #[must_use]
    pub fn report(&self) -> String {
        let events = self.events.lock().expect("test logger lock poisoned");
        let mut out = String::new();
        let _ = writeln!(out, "=== test log ({} events) ===", events.len());
        for record in events.iter() {
            let _ = writeln!(out, "[{:>10}us] {:?}", record.at_micros, record.event);
        }
        out
    }

    /// Discards all captured events.
    pub fn clear(&self) {
        self.events
            .lock()
            .expect("test logger lock poisoned")
            .clear();
    }
}

impl Default for TestLogger {
    fn default() -> Self {
        Self::new(TestLogLevel::Info)
    }
}

// ============================================================================
// Macros
// ============================================================================

/// Marks the start of a test in tracing output.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::tracing_compat::info!(test = $name, "=== TEST START ===");
    };
}

/// Marks a named section within a test.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        $crate::tracing_compat::info!(section = $name, "--- section ---");
    };
}

/// Marks the successful end of a test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::tracing_compat::info!(test = $name, "=== TEST COMPLETE ===");
    };
}

/// Asserts a condition, logging expected/actual on failure.
///
/// The condition must be side-effect free; it is evaluated twice.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            $crate::tracing_compat::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "assertion failed"
            );
        }
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Logs a custom event to a test logger.
#[macro_export]
macro_rules! test_log {
    ($logger:expr, $cat:literal, $($arg:tt)*) => {
        $logger.log($crate::test_logging::TestEvent::Custom {
            category: $cat,
            message: format!($($arg)*),
        });
    };
}

/// Logs a warning event to a test logger.
#[macro_export]
macro_rules! test_warn {
    ($logger:expr, $cat:literal, $($arg:tt)*) => {
        $logger.log($crate::test_logging::TestEvent::Warn {
            category: $cat,
            message: format!($($arg)*),
        });
    };
}

/// Logs an error event to a test logger.
#[macro_export]
macro_rules! test_error {
    ($logger:expr, $cat:literal, $($arg:tt)*) => {
        $logger.log($crate::test_logging::TestEvent::Error {
            category: $cat,
            message: format!($($arg)*),
        });
    };
}

/// Asserts a condition, printing the full captured log on failure.
#[macro_export]
macro_rules! assert_log {
    ($logger:expr, $cond:expr) => {
        if !$cond {
            eprintln!("{}", $logger.report());
            panic!("assertion failed: {}", stringify!($cond));
        }
    };
    ($logger:expr, $cond:expr, $($arg:tt)*) => {
        if !$cond {
            eprintln!("{}", $logger.report());
            panic!($($arg)*);
        }
    };
}

/// Asserts equality, printing the full captured log on failure.
#[macro_export]
macro_rules! assert_eq_log {
    ($logger:expr, $left:expr, $right:expr) => {
        if $left != $right {
            eprintln!("{}", $logger.report());
            panic!(
                "assertion failed: `(left == right)`\n  left: {:?}\n right: {:?}",
                $left, $right
            );
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(TestLogLevel::Error < TestLogLevel::Warn);
        assert!(TestLogLevel::Warn < TestLogLevel::Info);
        assert!(TestLogLevel::Info < TestLogLevel::Debug);
        assert!(TestLogLevel::Debug < TestLogLevel::Trace);
    }

    #[test]
    fn level_from_str() {
        assert_eq!("error".parse(), Ok(TestLogLevel::Error));
        assert_eq!("WARNING".parse(), Ok(TestLogLevel::Warn));
        assert_eq!("info".parse(), Ok(TestLogLevel::Info));
        assert_eq!("debug".parse(), Ok(TestLogLevel::Debug));
        assert_eq!("trace".parse(), Ok(TestLogLevel::Trace));
        assert_eq!("nope".parse::<TestLogLevel>(), Err(()));
    }

    #[test]
    fn logger_captures_and_reports() {
        let logger = TestLogger::new(TestLogLevel::Trace);
        logger.log(TestEvent::TaskSpawn { task_id: 1 });
        logger.log(TestEvent::TaskPoll {
            task_id: 1,
            ready: true,
        });
        logger.log(TestEvent::TaskComplete { task_id: 1 });

        assert_eq!(logger.len(), 3);
        let report = logger.report();
        assert!(report.contains("TaskSpawn"), "report: {report}");
        assert!(report.contains("TaskComplete"), "report: {report}");
    }

    #[test]
    fn level_filters_capture() {
        let logger = TestLogger::new(TestLogLevel::Info);
        logger.log(TestEvent::TaskPoll {
            task_id: 1,
            ready: false,
        });
        assert!(logger.is_empty(), "trace event filtered at info level");

        logger.log(TestEvent::TaskSpawn { task_id: 1 });
        assert_eq!(logger.len(), 1);
    }

    #[test]
    fn count_matching_selects_events() {
        let logger = TestLogger::new(TestLogLevel::Debug);
        logger.log(TestEvent::TimerRegister { timer_id: 1 });
        logger.log(TestEvent::TimerRegister { timer_id: 2 });
        logger.log(TestEvent::TimerFire { timer_id: 1 });

        let registered =
            logger.count_matching(|e| matches!(e, TestEvent::TimerRegister { .. }));
        assert_eq!(registered, 2);
    }

    #[test]
    fn clear_discards_history() {
        let logger = TestLogger::default();
        test_log!(logger, "setup", "spawning {} tasks", 3);
        assert_eq!(logger.len(), 1);
        logger.clear();
        assert!(logger.is_empty());
    }

    #[test]
    fn logger_macros_record_by_level() {
        let logger = TestLogger::new(TestLogLevel::Error);
        test_log!(logger, "setup", "ignored at error level");
        test_warn!(logger, "timer", "also ignored");
        test_error!(logger, "queue", "captured: {}", 42);
        assert_eq!(logger.len(), 1);
        assert_log!(logger, logger.len() == 1);
    }
}
