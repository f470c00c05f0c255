//! Concurrency stress suite for the scheduling primitives.
//!
//! Run with: `cargo test --test queue_stress`

mod common {
    pub fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init();
    }
}

macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST START ===");
    };
}

use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::{Arc, Barrier};
use std::thread;

use spindle::scheduler::{AcquireError, GlobalQueue, LocalQueue, Node, NodeList};

fn init_test(name: &str) {
    common::init_test_logging();
    test_phase!(name);
}

fn alloc_nodes(n: usize) -> Vec<NonNull<Node>> {
    (0..n)
        .map(|_| NonNull::from(Box::leak(Box::new(Node::new()))))
        .collect()
}

fn free_nodes(ptrs: impl IntoIterator<Item = usize>) {
    for ptr in ptrs {
        drop(unsafe { Box::from_raw(ptr as *mut Node) });
    }
}

fn list_of(nodes: &[NonNull<Node>]) -> NodeList {
    let mut iter = nodes.iter();
    let mut list = unsafe { NodeList::from_node(*iter.next().expect("non-empty")) };
    for &node in iter {
        list.append(unsafe { NodeList::from_node(node) });
    }
    list
}

#[test]
fn ring_overflow_hands_back_at_least_half_plus_extra() {
    init_test("ring_overflow_hands_back_at_least_half_plus_extra");
    let capacity = 256u32;
    let extra = 10usize;
    let mut ring = LocalQueue::with_capacity(capacity);
    let nodes = alloc_nodes(capacity as usize + extra);

    let overflow = unsafe { ring.push(list_of(&nodes)) }.expect_err("push must overflow");
    let returned = overflow.list.count();
    assert!(
        returned >= extra + capacity as usize / 2,
        "expected at least {}, got {returned}",
        extra + capacity as usize / 2
    );
    assert_eq!(returned + ring.len() as usize, nodes.len());

    free_nodes(nodes.iter().map(|n| n.as_ptr() as usize));
}

#[test]
fn contended_pushes_drain_to_the_same_multiset() {
    init_test("contended_pushes_drain_to_the_same_multiset");
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 1_000;

    let queue = Arc::new(GlobalQueue::new());
    let barrier = Arc::new(Barrier::new(PRODUCERS + 1));

    let mut producers = Vec::new();
    for _ in 0..PRODUCERS {
        let queue = Arc::clone(&queue);
        let barrier = Arc::clone(&barrier);
        producers.push(thread::spawn(move || {
            let nodes = alloc_nodes(PER_PRODUCER);
            barrier.wait();
            // Mixed batch sizes: singletons and chains.
            for chunk in nodes.chunks(7) {
                unsafe { queue.push(list_of(chunk)) };
            }
            nodes.iter().map(|n| n.as_ptr() as usize).collect::<Vec<_>>()
        }));
    }

    barrier.wait();
    let mut drained = Vec::new();
    while drained.len() < PRODUCERS * PER_PRODUCER {
        match queue.try_acquire_consumer() {
            Ok(mut consumer) => {
                while let Some(node) = consumer.pop() {
                    drained.push(node.as_ptr() as usize);
                }
            }
            Err(AcquireError::Empty) => thread::yield_now(),
            Err(AcquireError::Contended) => unreachable!("sole consumer"),
        }
    }

    let mut pushed = HashSet::new();
    for producer in producers {
        for ptr in producer.join().expect("producer join") {
            assert!(pushed.insert(ptr));
        }
    }
    let drained_set: HashSet<usize> = drained.iter().copied().collect();
    assert_eq!(drained_set.len(), drained.len(), "no double pops");
    assert_eq!(drained_set, pushed, "push/drain multiset equality");

    let stats = queue.stats();
    assert!(stats.pushes > 0);

    free_nodes(pushed);
}

#[test]
fn thieves_and_owner_split_the_work_without_loss() {
    init_test("thieves_and_owner_split_the_work_without_loss");
    const TOTAL: usize = 4_096;
    const THIEVES: usize = 4;

    let mut owner = LocalQueue::with_capacity(256);
    let global = Arc::new(GlobalQueue::new());
    let nodes = alloc_nodes(TOTAL);
    let expected: HashSet<usize> = nodes.iter().map(|n| n.as_ptr() as usize).collect();

    if let Err(overflow) = unsafe { owner.push(list_of(&nodes)) } {
        unsafe { global.push(overflow.list) };
    }

    let stealer = owner.stealer();
    let barrier = Arc::new(Barrier::new(THIEVES + 1));
    let mut thieves = Vec::new();
    for _ in 0..THIEVES {
        let stealer = stealer.clone();
        let global = Arc::clone(&global);
        let barrier = Arc::clone(&barrier);
        thieves.push(thread::spawn(move || {
            let mut local = LocalQueue::with_capacity(256);
            let mut taken = Vec::new();
            barrier.wait();
            loop {
                while let Some(node) = local.pop() {
                    taken.push(node.as_ptr() as usize);
                }
                if let Some(stolen) = local.steal_from(&stealer) {
                    taken.push(stolen.node.as_ptr() as usize);
                    continue;
                }
                if let Some(stolen) = local.consume(&global) {
                    taken.push(stolen.node.as_ptr() as usize);
                    continue;
                }
                if stealer.is_empty() && global.is_empty() {
                    break;
                }
                thread::yield_now();
            }
            taken
        }));
    }

    barrier.wait();
    let mut taken = Vec::new();
    while let Some(node) = owner.pop() {
        taken.push(node.as_ptr() as usize);
        thread::yield_now();
    }

    let mut seen: HashSet<usize> = HashSet::new();
    for ptr in taken {
        assert!(seen.insert(ptr), "owner saw a node twice");
    }
    for thief in thieves {
        for ptr in thief.join().expect("thief join") {
            assert!(seen.insert(ptr), "a node was taken twice");
        }
    }
    assert_eq!(seen, expected, "every node taken exactly once");

    free_nodes(expected);
}

#[test]
fn ping_pong_between_rings_conserves_nodes() {
    init_test("ping_pong_between_rings_conserves_nodes");
    const NODES: usize = 128;
    const ROUNDS: usize = 200;

    let mut left = LocalQueue::with_capacity(256);
    let mut right = LocalQueue::with_capacity(256);
    let nodes = alloc_nodes(NODES);
    unsafe { left.push(list_of(&nodes)) }.expect("fits");

    let left_stealer = left.stealer();
    let right_stealer = right.stealer();

    // Alternately steal everything across and back on one thread; the
    // population must be conserved through every migration.
    for round in 0..ROUNDS {
        let (thief, victim) = if round % 2 == 0 {
            (&mut right, &left_stealer)
        } else {
            (&mut left, &right_stealer)
        };
        // Empty the thief by draining into a scratch list first.
        let mut scratch = Vec::new();
        while let Some(node) = thief.pop() {
            scratch.push(node);
        }
        while let Some(stolen) = thief.steal_from(victim) {
            scratch.push(stolen.node);
            while let Some(node) = thief.pop() {
                scratch.push(node);
            }
        }
        if !scratch.is_empty() {
            unsafe { thief.push(list_of(&scratch)) }.expect("scratch fits");
        }

        let total = left_stealer.len() + right_stealer.len();
        assert_eq!(total as usize, NODES, "round {round} lost nodes");
    }

    let mut count = 0;
    while left.pop().is_some() {
        count += 1;
    }
    while right.pop().is_some() {
        count += 1;
    }
    assert_eq!(count, NODES);

    free_nodes(nodes.iter().map(|n| n.as_ptr() as usize));
}

#[test]
fn consume_moves_shared_work_into_the_ring() {
    init_test("consume_moves_shared_work_into_the_ring");
    let global = GlobalQueue::new();
    let mut ring = LocalQueue::with_capacity(64);
    let nodes = alloc_nodes(40);
    unsafe { global.push(list_of(&nodes)) };

    let stolen = ring.consume(&global).expect("shared work available");
    assert!(stolen.pushed_to_buffer);
    assert_eq!(ring.len(), 39, "one node returned, the rest buffered");
    assert!(global.is_empty());

    let mut count = 1; // the directly-returned node
    while ring.pop().is_some() {
        count += 1;
    }
    assert_eq!(count, 40);

    free_nodes(nodes.iter().map(|n| n.as_ptr() as usize));
}
