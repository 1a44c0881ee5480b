#![forbid(unsafe_code)]

use std::sync::Arc;

use campus_core::{Dataset, FilterCriteria, StudentRequest, Task};
use campus_query::{filter, summarize};
use campus_store::{accept_request, reject_request, toggle_task, CollectionBuilder, Edit, SharedCollection};

#[test]
fn replay_review_session() {
    let requests: Vec<StudentRequest> = Dataset::Requests.load_as().unwrap();
    let mut b = CollectionBuilder::new(requests);

    // The supervisor works through the pending queue in two sittings.
    b.apply(vec![accept_request(1), reject_request(2)]);
    let snap1 = b.freeze();
    assert_eq!(snap1.epoch, 1);
    let s1 = summarize(&snap1.items, &["status"]);
    assert_eq!(s1.count("status", "pending"), 1);
    assert_eq!(s1.count("status", "accepted"), 2);
    assert_eq!(s1.count("status", "rejected"), 1);

    // Changing one's mind replaces the earlier decision.
    b.apply(vec![accept_request(2), accept_request(4)]);
    let snap2 = b.freeze();
    assert_eq!(snap2.epoch, 2);
    let pending = filter(&snap2.items, &FilterCriteria::new().with("status", "pending"));
    assert!(pending.is_empty());
    assert_eq!(summarize(&snap2.items, &["status"]).count("status", "accepted"), 4);

    // The first snapshot is untouched.
    assert_eq!(summarize(&snap1.items, &["status"]).count("status", "pending"), 1);
}

#[test]
fn task_board_counts_follow_toggles() {
    let tasks: Vec<Task> = Dataset::Tasks.load_as().unwrap();
    let shared = SharedCollection::new(tasks);
    shared.apply(vec![toggle_task(2), toggle_task(5), Edit::set(4, "priority", "high")]);
    let snap = shared.current();
    let s = summarize(&snap.items, &["status", "priority"]);
    assert_eq!(s.count("status", "completed"), 2);
    assert_eq!(s.count("status", "pending"), 2);
    assert_eq!(s.count("status", "in-progress"), 1);
    assert_eq!(s.count("priority", "high"), 3);
}

#[test]
fn readers_see_whole_batches_only() {
    let requests: Vec<StudentRequest> = Dataset::Requests.load_as().unwrap();
    let shared = Arc::new(SharedCollection::new(requests));
    let handle = shared.handle();

    let reader = std::thread::spawn(move || {
        let mut last_epoch = 0u64;
        for _ in 0..200 {
            let snap = handle.current();
            assert!(snap.epoch >= last_epoch, "epochs must not go backwards");
            last_epoch = snap.epoch;
            // Each batch flips request 1 and 4 together, so they always agree.
            assert_eq!(snap.items[0].status, snap.items[3].status);
            assert_eq!(summarize(&snap.items, &["status"]).get("status").unwrap().total(), 4);
        }
    });

    for i in 0..50 {
        let batch = if i % 2 == 0 {
            vec![accept_request(1), accept_request(4)]
        } else {
            vec![Edit::set(1, "status", "pending"), Edit::set(4, "status", "pending")]
        };
        shared.apply(batch);
    }
    reader.join().unwrap();
    assert_eq!(shared.current().epoch, 50);
}
