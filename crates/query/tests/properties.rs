//! Property tests for filtering and counting.

use campus_core::{DynRecord, FilterCriteria, Record};
use campus_query::{filter, matches, sum_by, summarize};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Generators
// ============================================================================

fn arb_status() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        Just(Some("pending")),
        Just(Some("accepted")),
        Just(Some("rejected")),
        Just(None),
    ]
}

fn arb_priority() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("high"), Just("medium"), Just("low")]
}

/// Records with a status (sometimes missing), a priority and integral credits.
fn arb_records() -> impl Strategy<Value = Vec<DynRecord>> {
    prop::collection::vec((arb_status(), arb_priority(), 0..6u32), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (status, priority, credits))| {
                let mut v = json!({ "id": i, "priority": priority, "credits": credits });
                if let Some(s) = status {
                    v["status"] = json!(s);
                }
                DynRecord::new(i, v)
            })
            .collect()
    })
}

fn arb_selection(values: &'static [&'static str]) -> impl Strategy<Value = &'static str> {
    prop::sample::select(values)
}

fn arb_criteria() -> impl Strategy<Value = FilterCriteria> {
    (
        arb_selection(&["all", "pending", "accepted", "rejected", "unknown"]),
        arb_selection(&["all", "high", "medium", "low"]),
    )
        .prop_map(|(status, priority)| FilterCriteria::new().with("status", status).with("priority", priority))
}

fn ids<R: Record>(items: &[R]) -> Vec<u64> {
    items.iter().map(|r| r.id()).collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn filter_is_an_ordered_subsequence(records in arb_records(), criteria in arb_criteria()) {
        let out = filter(&records, &criteria);
        let mut cursor = records.iter();
        for hit in &out {
            prop_assert!(cursor.any(|r| std::ptr::eq(r, *hit)), "output is not a subsequence");
            prop_assert!(matches(*hit, &criteria));
        }
        let expected = records.iter().filter(|r| matches(*r, &criteria)).count();
        prop_assert_eq!(out.len(), expected);
    }

    #[test]
    fn unconstrained_filter_returns_input(records in arb_records()) {
        let all = FilterCriteria::new().with("status", "all").with("priority", "all");
        prop_assert_eq!(ids(&filter(&records, &all)), ids(&records));
        prop_assert_eq!(ids(&filter(&records, &FilterCriteria::new())), ids(&records));
    }

    #[test]
    fn filter_is_idempotent(records in arb_records(), criteria in arb_criteria()) {
        let once = filter(&records, &criteria);
        let twice = filter(&once, &criteria);
        prop_assert_eq!(ids(&twice), ids(&once));
    }

    #[test]
    fn tallies_partition_the_collection(records in arb_records()) {
        let s = summarize(&records, &["status", "priority"]);
        let status = s.get("status").unwrap();
        prop_assert_eq!(status.total() + status.missing, records.len());
        let priority = s.get("priority").unwrap();
        prop_assert_eq!(priority.missing, 0);
        prop_assert_eq!(priority.total(), records.len());
    }

    #[test]
    fn filtered_count_matches_tally(records in arb_records(), status in arb_selection(&["pending", "accepted", "rejected"])) {
        let s = summarize(&records, &["status"]);
        let hits = filter(&records, &FilterCriteria::new().with("status", status));
        prop_assert_eq!(hits.len(), s.count("status", status));
    }

    #[test]
    fn credit_sum_matches_manual_total(records in arb_records()) {
        let manual: f64 = records.iter().filter_map(|r| r.field("credits").and_then(|v| v.as_number())).sum();
        prop_assert_eq!(sum_by(&records, "credits").unwrap(), manual);
    }
}

#[test]
fn empty_collection_edge_cases() {
    let none: Vec<DynRecord> = Vec::new();
    let s = summarize(&none, &["status"]);
    assert!(s.get("status").unwrap().is_empty());
    assert_eq!(sum_by(&none, "credits").unwrap(), 0.0);
    assert!(filter(&none, &FilterCriteria::new().with("status", "pending")).is_empty());
}
