//! Error types and error handling strategy.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - All non-fatal conditions are returned to the caller as values,
//!   never raised out of band
//! - Hot-path signals keep their own small types
//!   ([`AcquireError`](crate::scheduler::AcquireError),
//!   [`Overflow`](crate::scheduler::Overflow),
//!   [`Elapsed`](crate::timer::Elapsed)) so matching on them costs nothing
//!
//! # Recovery Classification
//!
//! Every [`ErrorKind`] classifies as retryable or not via
//! [`is_retryable`](ErrorKind::is_retryable): queue contention clears on
//! its own, a timeout or an exhausted allocation does not.

use core::fmt;
use std::collections::TryReserveError;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A deadline elapsed before the wrapped operation completed.
    Timeout,
    /// The shared queue had nothing to consume.
    QueueEmpty,
    /// Another consumer currently holds the shared queue.
    QueueContended,
    /// A ring buffer push exceeded capacity and handed work back.
    RingOverflow,
    /// The executor's run loop was re-entered.
    AlreadyRunning,
    /// An allocation could not be satisfied.
    OutOfMemory,
    /// Invalid configuration.
    Config,
    /// Internal runtime error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout => ErrorCategory::Time,
            Self::QueueEmpty | Self::QueueContended | Self::RingOverflow => ErrorCategory::Queue,
            Self::AlreadyRunning => ErrorCategory::Executor,
            Self::OutOfMemory => ErrorCategory::Resource,
            Self::Config | Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Returns true if retrying the operation can succeed without
    /// intervention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueEmpty | Self::QueueContended | Self::RingOverflow)
    }

    /// Short stable name, usable as a log field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::QueueEmpty => "queue_empty",
            Self::QueueContended => "queue_contended",
            Self::RingOverflow => "ring_overflow",
            Self::AlreadyRunning => "already_running",
            Self::OutOfMemory => "out_of_memory",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// High-level grouping of related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Deadline and timer errors.
    Time,
    /// Scheduling queue signals.
    Queue,
    /// Executor lifecycle errors.
    Executor,
    /// Resource exhaustion.
    Resource,
    /// Configuration problems and runtime bugs.
    Internal,
}

/// A runtime error: a kind plus optional static context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    context: Option<&'static str>,
}

impl Error {
    /// Creates an error of the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Creates an error with a static context string.
    #[must_use]
    pub const fn with_context(kind: ErrorKind, context: &'static str) -> Self {
        Self {
            kind,
            context: Some(context),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.context {
            Some(context) => write!(f, "{}: {context}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Self::new(ErrorKind::OutOfMemory)
    }
}
