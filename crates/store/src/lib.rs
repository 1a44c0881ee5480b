//! Campus store: applies portal edits to a collection and publishes
//! immutable, epoch-stamped snapshots for the query engine to read.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use campus_core::{Record, RecordId, RecordMut};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    Set { field: String, value: String },
    /// Flip `field` to `off` when it currently reads `on`, otherwise to `on`.
    Toggle { field: String, on: String, off: String },
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub id: RecordId,
    pub op: EditOp,
}

impl Edit {
    pub fn set(id: RecordId, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { id, op: EditOp::Set { field: field.into(), value: value.into() } }
    }

    pub fn toggle(id: RecordId, field: impl Into<String>, on: impl Into<String>, off: impl Into<String>) -> Self {
        Self { id, op: EditOp::Toggle { field: field.into(), on: on.into(), off: off.into() } }
    }

    pub fn remove(id: RecordId) -> Self {
        Self { id, op: EditOp::Remove }
    }
}

pub fn accept_request(id: RecordId) -> Edit {
    Edit::set(id, "status", "accepted")
}

pub fn reject_request(id: RecordId) -> Edit {
    Edit::set(id, "status", "rejected")
}

/// Completed tasks go back to pending; anything else becomes completed.
pub fn toggle_task(id: RecordId) -> Edit {
    Edit::toggle(id, "status", "completed", "pending")
}

/// Outcome of one batch. Unknown ids and refused values are counted, not raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub applied: usize,
    pub unknown_ids: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<R> {
    pub epoch: u64,
    pub items: Vec<R>,
}

/// Builds snapshots from a record list and batches of edits.
pub struct CollectionBuilder<R> {
    epoch: u64,
    items: Vec<R>,
    index: FxHashMap<RecordId, usize>,
}

impl<R: RecordMut + Clone> CollectionBuilder<R> {
    pub fn new(items: Vec<R>) -> Self {
        let mut me = Self { epoch: 0, items, index: FxHashMap::default() };
        me.reindex();
        me
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (pos, r) in self.items.iter().enumerate() {
            let id = r.id();
            if self.index.contains_key(&id) {
                warn!(id, pos, "duplicate record id; edits address the first occurrence");
                continue;
            }
            self.index.insert(id, pos);
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply a batch in order and advance the epoch.
    pub fn apply(&mut self, batch: Vec<Edit>) -> ApplyReport {
        let mut report = ApplyReport::default();
        for edit in batch {
            let Some(&pos) = self.index.get(&edit.id) else {
                warn!(id = edit.id, "edit addresses an unknown record");
                report.unknown_ids += 1;
                continue;
            };
            let outcome = match &edit.op {
                EditOp::Set { field, value } => self.items[pos].set_field(field, value),
                EditOp::Toggle { field, on, off } => {
                    let current = self.items[pos].field(field).and_then(|v| v.category()).map(|c| c.into_owned());
                    let next = if current.as_deref() == Some(on.as_str()) { off } else { on };
                    self.items[pos].set_field(field, next)
                }
                EditOp::Remove => {
                    self.items.remove(pos);
                    self.reindex();
                    Ok(())
                }
            };
            match outcome {
                Ok(()) => {
                    debug!(id = edit.id, op = ?edit.op, "edit applied");
                    report.applied += 1;
                }
                Err(e) => {
                    warn!(id = edit.id, error = %e, "edit rejected");
                    report.rejected += 1;
                }
            }
        }
        self.epoch = self.epoch.saturating_add(1);
        metrics::counter!("store_edits_total", report.applied as u64);
        report
    }

    pub fn freeze(&self) -> Arc<Snapshot<R>> {
        Arc::new(Snapshot { epoch: self.epoch, items: self.items.clone() })
    }
}

/// Read side of a [`SharedCollection`]; cheap to clone and hand to views.
pub struct SnapshotHandle<R> {
    snap: Arc<ArcSwap<Snapshot<R>>>,
}

impl<R> Clone for SnapshotHandle<R> {
    fn clone(&self) -> Self {
        Self { snap: Arc::clone(&self.snap) }
    }
}

impl<R> SnapshotHandle<R> {
    pub fn current(&self) -> Arc<Snapshot<R>> {
        self.snap.load_full()
    }
}

/// Single writer, lock-free readers: edits go through a mutex around the
/// builder, readers load whole snapshots.
pub struct SharedCollection<R> {
    builder: Mutex<CollectionBuilder<R>>,
    snap: Arc<ArcSwap<Snapshot<R>>>,
}

impl<R: RecordMut + Clone> SharedCollection<R> {
    pub fn new(items: Vec<R>) -> Self {
        let builder = CollectionBuilder::new(items);
        let snap = Arc::new(ArcSwap::new(builder.freeze()));
        Self { builder: Mutex::new(builder), snap }
    }

    pub fn current(&self) -> Arc<Snapshot<R>> {
        self.snap.load_full()
    }

    pub fn handle(&self) -> SnapshotHandle<R> {
        SnapshotHandle { snap: Arc::clone(&self.snap) }
    }

    pub fn apply(&self, batch: Vec<Edit>) -> ApplyReport {
        let mut builder = self.builder.lock().unwrap_or_else(PoisonError::into_inner);
        let report = builder.apply(batch);
        let next = builder.freeze();
        debug!(epoch = next.epoch, items = next.items.len(), "publishing snapshot");
        self.snap.store(next);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::{Dataset, StudentRequest, Task};

    fn requests() -> Vec<StudentRequest> {
        Dataset::Requests.load_as().unwrap()
    }

    #[test]
    fn accept_and_reject_update_status() {
        let mut b = CollectionBuilder::new(requests());
        let report = b.apply(vec![accept_request(1), reject_request(4)]);
        assert_eq!(report, ApplyReport { applied: 2, unknown_ids: 0, rejected: 0 });
        let snap = b.freeze();
        assert_eq!(snap.epoch, 1);
        assert_eq!(snap.items[0].status, "accepted");
        assert_eq!(snap.items[3].status, "rejected");
        assert_eq!(snap.items[1].status, "pending");
    }

    #[test]
    fn toggle_flips_completed_and_pending() {
        let tasks: Vec<Task> = Dataset::Tasks.load_as().unwrap();
        let mut b = CollectionBuilder::new(tasks);
        b.apply(vec![toggle_task(1), toggle_task(3)]);
        let s1 = b.freeze();
        assert_eq!(s1.items[0].status, "completed");
        assert_eq!(s1.items[2].status, "completed");
        b.apply(vec![toggle_task(1)]);
        assert_eq!(b.freeze().items[0].status, "pending");
    }

    #[test]
    fn unknown_ids_and_bad_fields_are_counted() {
        let mut b = CollectionBuilder::new(requests());
        let report = b.apply(vec![accept_request(99), Edit::set(1, "grade", "A"), Edit::set(2, "id", "7")]);
        assert_eq!(report, ApplyReport { applied: 0, unknown_ids: 1, rejected: 2 });
        assert_eq!(b.epoch(), 1);
    }

    #[test]
    fn remove_keeps_order_and_reindexes() {
        let mut b = CollectionBuilder::new(requests());
        b.apply(vec![Edit::remove(2), accept_request(3)]);
        let snap = b.freeze();
        let ids: Vec<u64> = snap.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(snap.items[1].status, "accepted");
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn old_snapshots_are_not_affected_by_later_edits() {
        let shared = SharedCollection::new(requests());
        let before = shared.current();
        shared.apply(vec![accept_request(1)]);
        let after = shared.handle().current();
        assert_eq!(before.epoch, 0);
        assert_eq!(before.items[0].status, "pending");
        assert_eq!(after.epoch, 1);
        assert_eq!(after.items[0].status, "accepted");
    }
}
