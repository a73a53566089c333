//! Concurrent polling: every pending order goes to exactly one worker.

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use common::{FileEntryBuilder, TestHarness};
use printhub::{JobDispatcher, OrderStatus, TransitionPolicy};

fn poll_concurrently(harness: &TestHarness, workers: usize) -> Vec<String> {
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|i| {
            // Half the workers share the harness connection, half open their own.
            let db = if i % 2 == 0 {
                harness.db.clone()
            } else {
                harness.reopen()
            };
            let dispatcher = JobDispatcher::new(db, TransitionPolicy::Permissive);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                dispatcher
                    .poll_next_job()
                    .expect("poll failed")
                    .map(|job| {
                        assert_eq!(job.status, OrderStatus::Processing);
                        job.id
                    })
            })
        })
        .collect();

    handles
        .into_iter()
        .filter_map(|h| h.join().expect("worker panicked"))
        .collect()
}

#[test]
fn test_more_workers_than_jobs() {
    let harness = TestHarness::new();
    let seeded: HashSet<String> = (0..5)
        .map(|i| harness.seed_order(vec![FileEntryBuilder::new(&format!("{i}.pdf")).build()]))
        .collect();

    let claimed = poll_concurrently(&harness, 12);

    assert_eq!(claimed.len(), 5);
    let unique: HashSet<String> = claimed.into_iter().collect();
    assert_eq!(unique, seeded);

    let counts = harness.dispatcher.status_counts().unwrap();
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.processing, 5);
}

#[test]
fn test_more_jobs_than_workers() {
    let harness = TestHarness::new();
    for i in 0..20 {
        harness.seed_order(vec![FileEntryBuilder::new(&format!("{i}.pdf")).build()]);
    }

    let claimed = poll_concurrently(&harness, 8);

    assert_eq!(claimed.len(), 8);
    let unique: HashSet<&String> = claimed.iter().collect();
    assert_eq!(unique.len(), 8);

    let counts = harness.dispatcher.status_counts().unwrap();
    assert_eq!(counts.pending, 12);
    assert_eq!(counts.processing, 8);
}

#[test]
fn test_drain_in_creation_order() {
    let harness = TestHarness::new();
    let seeded: Vec<String> = (0..4)
        .map(|i| harness.seed_order(vec![FileEntryBuilder::new(&format!("{i}.pdf")).build()]))
        .collect();

    let mut drained = Vec::new();
    while let Some(job) = harness.dispatcher.poll_next_job().unwrap() {
        drained.push(job.id);
    }
    assert_eq!(drained, seeded);
}
