//! Per-worker bounded ring buffer.
//!
//! Single producer (the owning worker), multiple consumers: the owner
//! pops and peers steal, both by advancing `head` with a CAS. The two
//! paths contend on `head`, never on `tail`, which only the owner
//! writes. Indices are wrapping `u32` counters, so occupancy is always
//! `tail - head` in wrapping arithmetic, correct across wrap-around.
//!
//! When a push would exceed capacity the owner migrates half of the
//! buffer to itself and hands the combined chain back as [`Overflow`];
//! the caller forwards it to the shared [`GlobalQueue`]. When the
//! buffer runs dry the owner can [`steal_from`](LocalQueue::steal_from)
//! a peer (taking half) or [`consume`](LocalQueue::consume) from the
//! shared queue (filling up to capacity).
//!
//! Slot reads and writes are `Relaxed`: the Release store of the index
//! that publishes them (or the CAS that claims them) is what orders the
//! batch.

use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicPtr, AtomicU32, Ordering};
use std::sync::Arc;

use crate::config::RingConfig;
use crate::tracing_compat::trace;

use super::global_queue::GlobalQueue;
use super::intrusive::{Node, NodeList};

/// A push exceeded capacity; the chain must go to the shared queue.
///
/// Contains the not-yet-pushed remainder followed by the migrated half
/// of the buffer.
#[derive(Debug)]
pub struct Overflow {
    /// The nodes the ring could not hold.
    pub list: NodeList,
}

/// Result of taking work from a peer or the shared queue.
#[derive(Debug)]
pub struct Stolen {
    /// One node for the caller to run directly.
    pub node: NonNull<Node>,
    /// Whether additional nodes were retained in the caller's buffer.
    pub pushed_to_buffer: bool,
}

struct RingInner {
    head: AtomicU32,
    tail: AtomicU32,
    slots: Box<[AtomicPtr<Node>]>,
    mask: u32,
}

impl RingInner {
    fn capacity(&self) -> u32 {
        self.mask + 1
    }

    fn slot(&self, pos: u32) -> &AtomicPtr<Node> {
        &self.slots[(pos & self.mask) as usize]
    }

    fn len(&self) -> u32 {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }
}

impl fmt::Debug for RingInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingInner")
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Owner handle of a per-worker ring buffer.
///
/// Deliberately not `Clone`: single-producer discipline is enforced by
/// exclusive ownership of this handle, with mutating operations taking
/// `&mut self`. Peers interact through [`Stealer`] handles.
#[derive(Debug)]
pub struct LocalQueue {
    inner: Arc<RingInner>,
}

/// Cloneable peer handle for stealing from a [`LocalQueue`].
#[derive(Debug, Clone)]
pub struct Stealer {
    inner: Arc<RingInner>,
}

impl LocalQueue {
    /// Creates a ring with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(RingConfig::default().capacity)
    }

    /// Creates a ring with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics unless `capacity` is a power of two in
    /// `2..=RingConfig::MAX_CAPACITY`; validate via
    /// [`RuntimeConfig`](crate::config::RuntimeConfig) first when the
    /// value comes from outside.
    #[must_use]
    pub fn with_capacity(capacity: u32) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity >= 2 && capacity <= RingConfig::MAX_CAPACITY,
            "ring capacity must be a power of two in 2..={}",
            RingConfig::MAX_CAPACITY
        );
        let slots = (0..capacity)
            .map(|_| AtomicPtr::new(core::ptr::null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            inner: Arc::new(RingInner {
                head: AtomicU32::new(0),
                tail: AtomicU32::new(0),
                slots,
                mask: capacity - 1,
            }),
        }
    }

    /// Creates a steal handle for this ring.
    #[must_use]
    pub fn stealer(&self) -> Stealer {
        Stealer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Slot count.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.inner.capacity()
    }

    /// Current occupancy.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    /// Returns true if the ring holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes a chain of nodes.
    ///
    /// On overflow, half of the buffer is migrated out and returned
    /// together with the unpushed remainder; forward that chain to the
    /// shared queue.
    ///
    /// # Safety
    ///
    /// The nodes on `list` must stay valid and untouched by the caller
    /// until they are popped or stolen.
    pub unsafe fn push(&mut self, list: NodeList) -> Result<(), Overflow> {
        let inner = &*self.inner;
        let list_tail = list.tail();
        let mut pending = Some(list.head());
        let mut tail = inner.tail.load(Ordering::Relaxed);

        loop {
            let head = inner.head.load(Ordering::Acquire);
            let mut wrote = false;
            while let Some(node) = pending {
                if tail.wrapping_sub(head) >= inner.capacity() {
                    break;
                }
                // Read the link before the slot store; the node may be
                // popped (and relinked) the instant tail is published.
                pending = unsafe { node.as_ref() }.next;
                inner.slot(tail).store(node.as_ptr(), Ordering::Relaxed);
                tail = tail.wrapping_add(1);
                wrote = true;
            }
            if wrote {
                inner.tail.store(tail, Ordering::Release);
            }
            let Some(pending_head) = pending else {
                return Ok(());
            };

            // Full: migrate half of the occupancy back to ourselves.
            let size = tail.wrapping_sub(head);
            let migrate = size / 2;
            debug_assert!(migrate >= 1, "full ring of capacity >= 2 must migrate");
            if inner
                .head
                .compare_exchange(
                    head,
                    head.wrapping_add(migrate),
                    Ordering::Acquire,
                    Ordering::Relaxed,
                )
                .is_err()
            {
                // A thief moved head; there is room again.
                continue;
            }

            trace!(migrated = migrate, "ring overflow migration");

            // The range [head, head + migrate) is exclusively ours now;
            // rebuild it into a chain in slot order.
            let first = NonNull::new(inner.slot(head).load(Ordering::Relaxed))
                .expect("occupied slot holds a node");
            let mut prev = first;
            for i in 1..migrate {
                let node = NonNull::new(inner.slot(head.wrapping_add(i)).load(Ordering::Relaxed))
                    .expect("occupied slot holds a node");
                unsafe {
                    (*prev.as_ptr()).next = Some(node);
                }
                prev = node;
            }
            unsafe {
                (*prev.as_ptr()).next = None;
            }
            let mut combined = unsafe { NodeList::from_parts(first, prev) };

            // The unpushed remainder goes in front of the migrated half.
            let remainder = unsafe { NodeList::from_parts(pending_head, list_tail) };
            combined.prepend(remainder);
            return Err(Overflow { list: combined });
        }
    }

    /// Pops the oldest node.
    ///
    /// Written as a CAS on `head` rather than a tail decrement because
    /// thieves advance `head` concurrently.
    pub fn pop(&mut self) -> Option<NonNull<Node>> {
        let inner = &*self.inner;
        let mut head = inner.head.load(Ordering::Acquire);
        loop {
            let tail = inner.tail.load(Ordering::Relaxed);
            if tail.wrapping_sub(head) == 0 {
                return None;
            }
            match inner.head.compare_exchange(
                head,
                head.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    let node = inner.slot(head).load(Ordering::Relaxed);
                    return NonNull::new(node);
                }
                Err(observed) => head = observed,
            }
        }
    }

    /// Steals roughly half of a peer's nodes into this (empty) ring.
    ///
    /// Returns one node to run directly; the rest are published into
    /// this ring. `None` if the peer was empty or the caller lost every
    /// race.
    pub fn steal_from(&mut self, target: &Stealer) -> Option<Stolen> {
        debug_assert!(self.is_empty(), "steal requires an empty local buffer");
        let dst = &*self.inner;
        let src = &*target.inner;

        loop {
            let src_head = src.head.load(Ordering::Acquire);
            let src_tail = src.tail.load(Ordering::Acquire);
            let size = src_tail.wrapping_sub(src_head);
            if size == 0 {
                return None;
            }
            if size > src.capacity() {
                // Torn head/tail read; reload.
                core::hint::spin_loop();
                continue;
            }
            let steal_count = size - size / 2;
            debug_assert!(steal_count >= 1);
            debug_assert!(steal_count <= dst.capacity());

            let dst_tail = dst.tail.load(Ordering::Relaxed);
            for i in 0..steal_count {
                let node = src.slot(src_head.wrapping_add(i)).load(Ordering::Relaxed);
                dst.slot(dst_tail.wrapping_add(i)).store(node, Ordering::Relaxed);
            }

            if src
                .head
                .compare_exchange(
                    src_head,
                    src_head.wrapping_add(steal_count),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_err()
            {
                continue;
            }

            // The last copied node is handed straight to the caller;
            // only the ones before it become visible in our ring.
            let last = dst
                .slot(dst_tail.wrapping_add(steal_count - 1))
                .load(Ordering::Relaxed);
            let node = NonNull::new(last).expect("stolen slot holds a node");
            let retained = steal_count > 1;
            if retained {
                dst.tail
                    .store(dst_tail.wrapping_add(steal_count - 1), Ordering::Release);
            }
            trace!(stolen = steal_count, "stole from peer ring");
            return Some(Stolen {
                node,
                pushed_to_buffer: retained,
            });
        }
    }

    /// Drains the shared queue into this ring, up to capacity.
    ///
    /// Acquires the queue's consumer latch, fills from `tail`, and
    /// returns one extra node to run directly. `None` if the queue is
    /// empty or another consumer holds it.
    pub fn consume(&mut self, global: &GlobalQueue) -> Option<Stolen> {
        let mut consumer = global.try_acquire_consumer().ok()?;
        let first = consumer.pop()?;

        let inner = &*self.inner;
        let head = inner.head.load(Ordering::Acquire);
        let mut tail = inner.tail.load(Ordering::Relaxed);
        let start = tail;
        while tail.wrapping_sub(head) < inner.capacity() {
            let Some(node) = consumer.pop() else { break };
            inner.slot(tail).store(node.as_ptr(), Ordering::Relaxed);
            tail = tail.wrapping_add(1);
        }
        if tail != start {
            inner.tail.store(tail, Ordering::Release);
        }
        Some(Stolen {
            node: first,
            pushed_to_buffer: tail != start,
        })
    }
}

impl Default for LocalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Stealer {
    /// Occupancy of the underlying ring.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    /// Returns true if the underlying ring is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
