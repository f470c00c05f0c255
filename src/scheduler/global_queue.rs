//! Shared injection queue: a lock-free MPMC LIFO stack.
//!
//! Any thread may push a pre-linked chain of nodes with a single CAS.
//! Consumption is serialized by a latch packed into the head word, so
//! at most one consumer drains at a time; everyone else sees
//! [`AcquireError::Contended`] and can go do something useful instead
//! of spinning.
//!
//! # Head word layout
//!
//! One `AtomicUsize` carries the top-of-stack pointer plus two tag bits
//! (`Node` alignment ≥ 4 keeps them free):
//!
//! - `HAS_CACHE` (bit 0): the consumer-private `cache` field holds a
//!   chain left over from a previous drain.
//! - `IS_CONSUMING` (bit 1): a consumer is active; the `cache` field is
//!   theirs alone.
//!
//! `HAS_CACHE == 0` and a null pointer field together mean empty.
//!
//! The queue never allocates or frees nodes; see
//! [`intrusive`](super::intrusive) for the ownership contract.

use core::cell::UnsafeCell;
use core::fmt;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::config::QueueConfig;
use crate::tracing_compat::trace;

use super::intrusive::{Node, NodeList};

const HAS_CACHE: usize = 0b01;
const IS_CONSUMING: usize = 0b10;
const TAG_MASK: usize = HAS_CACHE | IS_CONSUMING;

/// Why a consumer could not be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    /// Nothing to consume.
    Empty,
    /// Another consumer is already draining; retrying later may succeed.
    Contended,
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("queue is empty"),
            Self::Contended => f.write_str("queue already has a consumer"),
        }
    }
}

impl From<AcquireError> for crate::error::Error {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::Empty => Self::new(crate::error::ErrorKind::QueueEmpty),
            AcquireError::Contended => Self::new(crate::error::ErrorKind::QueueContended),
        }
    }
}

/// Monotonic operation counters. Diagnostic only; relaxed ordering.
#[derive(Debug, Default)]
struct QueueStats {
    pushes: AtomicU64,
    push_retries: AtomicU64,
    cache_hits: AtomicU64,
    contentions: AtomicU64,
}

/// A point-in-time copy of the queue's diagnostic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    /// Lists pushed.
    pub pushes: u64,
    /// CAS retries across all pushes.
    pub push_retries: u64,
    /// Pops served from the consumer-private cache.
    pub cache_hits: u64,
    /// Consumer acquisitions refused because one was active.
    pub contentions: u64,
}

/// The shared MPMC injection queue.
pub struct GlobalQueue {
    head: AtomicUsize,
    /// Leftover chain between consumer sessions. Valid only while
    /// `HAS_CACHE` is set; touched only under `IS_CONSUMING`.
    cache: UnsafeCell<*mut Node>,
    backoff_threshold: u32,
    backoff_spin_cap: u32,
    stats: QueueStats,
}

// SAFETY: the head word is atomic and the cache cell is guarded by the
// IS_CONSUMING latch; only the thread that won the acquire CAS reads or
// writes it until it releases.
unsafe impl Send for GlobalQueue {}
unsafe impl Sync for GlobalQueue {}

impl GlobalQueue {
    /// Creates an empty queue with default tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&QueueConfig::default())
    }

    /// Creates an empty queue with the given tuning.
    #[must_use]
    pub fn with_config(config: &QueueConfig) -> Self {
        Self {
            head: AtomicUsize::new(0),
            cache: UnsafeCell::new(ptr::null_mut()),
            backoff_threshold: config.backoff_threshold,
            backoff_spin_cap: config.backoff_spin_cap,
            stats: QueueStats::default(),
        }
    }

    /// Pushes a chain of nodes in one CAS.
    ///
    /// # Safety
    ///
    /// The nodes on `list` must stay valid and untouched by the caller
    /// until they are popped.
    pub unsafe fn push(&self, list: NodeList) {
        let new_top = list.head().as_ptr();
        debug_assert_eq!(
            new_top as usize & TAG_MASK,
            0,
            "node alignment must keep the tag bits clear"
        );

        let mut retries = 0u32;
        let mut current = self.head.load(Ordering::Relaxed);
        loop {
            let old_top = (current & !TAG_MASK) as *mut Node;
            // The chain is invisible to consumers until the CAS below
            // publishes it, so a plain write is fine here.
            unsafe {
                (*list.tail().as_ptr()).next = NonNull::new(old_top);
            }
            let next = new_top as usize | (current & TAG_MASK);
            match self
                .head
                .compare_exchange_weak(current, next, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => {
                    current = observed;
                    retries += 1;
                    self.stats.push_retries.fetch_add(1, Ordering::Relaxed);
                    self.backoff(retries);
                }
            }
        }
        self.stats.pushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Attempts to become the queue's sole consumer.
    pub fn try_acquire_consumer(&self) -> Result<Consumer<'_>, AcquireError> {
        let mut current = self.head.load(Ordering::Relaxed);
        loop {
            if current & IS_CONSUMING != 0 {
                self.stats.contentions.fetch_add(1, Ordering::Relaxed);
                return Err(AcquireError::Contended);
            }
            if current == 0 {
                return Err(AcquireError::Empty);
            }
            let had_cache = current & HAS_CACHE != 0;
            // Without a stored cache the consumer adopts the published
            // chain directly, clearing the pointer field.
            let next = if had_cache {
                current | IS_CONSUMING
            } else {
                HAS_CACHE | IS_CONSUMING
            };
            match self
                .head
                .compare_exchange(current, next, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => {
                    let cache = if had_cache {
                        // SAFETY: we now hold IS_CONSUMING; the cache
                        // cell is ours until release.
                        unsafe { *self.cache.get() }
                    } else {
                        (current & !TAG_MASK) as *mut Node
                    };
                    return Ok(Consumer { queue: self, cache });
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Acquire, pop one node, release.
    ///
    /// Returns `None` when the queue is empty or another consumer is
    /// active; callers that need to distinguish use
    /// [`try_acquire_consumer`](Self::try_acquire_consumer).
    #[must_use]
    pub fn pop(&self) -> Option<NonNull<Node>> {
        let mut consumer = self.try_acquire_consumer().ok()?;
        consumer.pop()
    }

    /// Returns true if the queue holds no nodes and no cached chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) & !IS_CONSUMING == 0
    }

    /// Copies out the diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            pushes: self.stats.pushes.load(Ordering::Relaxed),
            push_retries: self.stats.push_retries.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            contentions: self.stats.contentions.load(Ordering::Relaxed),
        }
    }

    /// Exponential spin once retries exceed the configured threshold.
    /// Tuning only; correctness never depends on it.
    fn backoff(&self, retries: u32) {
        if retries <= self.backoff_threshold {
            return;
        }
        let exponent = (retries - self.backoff_threshold).min(self.backoff_spin_cap);
        for _ in 0..(1u32 << exponent) {
            core::hint::spin_loop();
        }
        if retries == self.backoff_threshold + 1 {
            trace!(retries, "queue push backoff engaged");
        }
    }
}

impl Default for GlobalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GlobalQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.head.load(Ordering::Relaxed);
        f.debug_struct("GlobalQueue")
            .field("top", &((head & !TAG_MASK) as *const Node))
            .field("has_cache", &(head & HAS_CACHE != 0))
            .field("is_consuming", &(head & IS_CONSUMING != 0))
            .finish()
    }
}

/// Exclusive drain access to a [`GlobalQueue`].
///
/// Holds the `IS_CONSUMING` latch; dropping the guard stores the
/// unconsumed remainder back into the queue's cache and releases the
/// latch.
#[derive(Debug)]
pub struct Consumer<'a> {
    queue: &'a GlobalQueue,
    cache: *mut Node,
}

impl Consumer<'_> {
    /// Pops one node: from the private cache first, otherwise by
    /// detaching whatever chain producers have pushed since.
    pub fn pop(&mut self) -> Option<NonNull<Node>> {
        if let Some(node) = NonNull::new(self.cache) {
            // SAFETY: the cached chain is exclusively ours.
            self.cache = next_ptr(node);
            self.queue.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Some(node);
        }
        // Grab the published chain wholesale, leaving our latch bits.
        let prior = self
            .queue
            .head
            .swap(HAS_CACHE | IS_CONSUMING, Ordering::Acquire);
        let node = NonNull::new((prior & !TAG_MASK) as *mut Node)?;
        self.cache = next_ptr(node);
        Some(node)
    }
}

fn next_ptr(node: NonNull<Node>) -> *mut Node {
    // SAFETY: nodes reachable by the active consumer are valid and
    // exclusively owned by it.
    unsafe { node.as_ref() }
        .next
        .map_or(ptr::null_mut(), NonNull::as_ptr)
}

impl Drop for Consumer<'_> {
    fn drop(&mut self) {
        // SAFETY: still the active consumer until the fetch_sub below.
        unsafe {
            *self.queue.cache.get() = self.cache;
        }
        let mut release = IS_CONSUMING;
        if self.cache.is_null() {
            release += HAS_CACHE;
        }
        self.queue.head.fetch_sub(release, Ordering::Release);
    }
}
