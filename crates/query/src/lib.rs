//! Campus query: filtering, counting and totals over in-memory record lists.
//! Every operation borrows its input and keeps no state between calls.

#![forbid(unsafe_code)]

use campus_core::{FieldValue, FilterCriteria, Record, RecordId, SchemaError, SummaryCounts, Tally};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

mod list;

pub use list::{ListQuery, QueryDebugInfo, QueryOutcome, SummaryScope};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("field `{field}` of record {id} is not numeric")]
    NonNumericField { field: String, id: RecordId },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// True when `record` satisfies every constrained field of `criteria`.
/// A record without the field never matches it.
pub fn matches<R: Record + ?Sized>(record: &R, criteria: &FilterCriteria) -> bool {
    criteria.active().all(|(field, want)| match record.field(field).and_then(|v| v.category()) {
        Some(got) => got == want,
        None => {
            debug!(field, id = record.id(), "record lacks filter field; treating as non-matching");
            false
        }
    })
}

/// Records satisfying `criteria`, in input order.
pub fn filter<'a, R: Record>(records: &'a [R], criteria: &FilterCriteria) -> Vec<&'a R> {
    if criteria.is_unconstrained() {
        return records.iter().collect();
    }
    let out: Vec<&R> = records.iter().filter(|r| matches(*r, criteria)).collect();
    metrics::histogram!("query_candidates", out.len() as f64);
    out
}

/// Distribution of categories for a single field.
pub fn tally<R: Record>(records: &[R], field: &str) -> Tally {
    let mut slots: FxHashMap<String, usize> = FxHashMap::default();
    let mut entries: Vec<(String, usize)> = Vec::new();
    let mut missing = 0usize;
    for r in records {
        match r.field(field).and_then(|v| v.category()) {
            Some(cat) => {
                if let Some(&slot) = slots.get(&*cat) {
                    entries[slot].1 += 1;
                } else {
                    slots.insert(cat.to_string(), entries.len());
                    entries.push((cat.into_owned(), 1));
                }
            }
            None => missing += 1,
        }
    }
    if missing > 0 {
        debug!(field, missing, "records without a category were left out of the tally");
        metrics::counter!("query_missing_field_total", missing as u64);
    }
    Tally::from_counts(entries, missing)
}

/// Per-field category counts. Fields are reported in request order; repeats collapse.
pub fn summarize<R: Record>(records: &[R], fields: &[&str]) -> SummaryCounts {
    let mut out = SummaryCounts::new();
    for &field in fields {
        if out.get(field).is_none() {
            out.insert(field, tally(records, field));
        }
    }
    out
}

fn numeric<R: Record + ?Sized>(record: &R, field: &str) -> Result<f64, QueryError> {
    match record.field(field) {
        Some(FieldValue::Number(n)) => Ok(n),
        Some(_) => Err(QueryError::NonNumericField { field: field.to_string(), id: record.id() }),
        None => {
            debug!(field, id = record.id(), "record lacks numeric field; counting it as zero");
            Ok(0.0)
        }
    }
}

/// Sum of a numeric field. Present but non-numeric values are an error, never coerced.
pub fn sum_by<R: Record>(records: &[R], field: &str) -> Result<f64, QueryError> {
    let mut total = 0.0;
    for r in records {
        total += numeric(r, field)?;
    }
    Ok(total)
}

/// Sums of `numeric_field` per category of `group_field`, in first-seen order.
/// Records without a group category are skipped.
pub fn sum_by_group<R: Record>(
    records: &[R],
    group_field: &str,
    numeric_field: &str,
) -> Result<Vec<(String, f64)>, QueryError> {
    let mut slots: FxHashMap<String, usize> = FxHashMap::default();
    let mut out: Vec<(String, f64)> = Vec::new();
    for r in records {
        let Some(group) = r.field(group_field).and_then(|v| v.category()) else {
            debug!(field = group_field, id = r.id(), "record lacks group field; skipped");
            continue;
        };
        let n = numeric(r, numeric_field)?;
        match slots.get(&*group) {
            Some(&slot) => out[slot].1 += n,
            None => {
                slots.insert(group.to_string(), out.len());
                out.push((group.into_owned(), n));
            }
        }
    }
    Ok(out)
}

/// Distinct categories of `field` in first-seen order, e.g. for filter dropdowns.
pub fn distinct_values<R: Record>(records: &[R], field: &str) -> Vec<String> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut out = Vec::new();
    for r in records {
        if let Some(cat) = r.field(field).and_then(|v| v.category()) {
            if !seen.contains(&*cat) {
                seen.insert(cat.to_string());
                out.push(cat.into_owned());
            }
        }
    }
    out
}

/// Case-insensitive substring search over `fields`. A blank term keeps everything.
pub fn search<'a, R: Record>(records: &'a [R], term: &str, fields: &[&str]) -> Vec<&'a R> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|r| {
            fields.iter().any(|f| {
                r.field(f)
                    .and_then(|v| v.category())
                    .map(|s| s.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Position in the input slice.
    pub index: usize,
    pub score: i64,
}

/// Fuzzy search over the concatenated `fields`, best score first, ties by input position.
pub fn fuzzy_search<R: Record>(records: &[R], term: &str, fields: &[&str], limit: usize) -> Vec<Hit> {
    let term = term.trim();
    let matcher = SkimMatcherV2::default();
    let mut hits: Vec<Hit> = Vec::new();
    for (index, r) in records.iter().enumerate() {
        if term.is_empty() {
            hits.push(Hit { index, score: 0 });
            continue;
        }
        let mut text = String::new();
        for f in fields {
            if let Some(cat) = r.field(f).and_then(|v| v.category()) {
                text.push_str(&cat);
                text.push(' ');
            }
        }
        if let Some(score) = matcher.fuzzy_match(&text, term) {
            hits.push(Hit { index, score });
        }
    }
    hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.index.cmp(&b.index)));
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::{Course, Dataset, DynRecord, Student, StudentRequest, Task};
    use serde_json::json;

    fn tasks() -> Vec<Task> {
        Dataset::Tasks.load_as().unwrap()
    }

    fn dyns(values: &[serde_json::Value]) -> Vec<DynRecord> {
        values.iter().cloned().enumerate().map(|(i, v)| DynRecord::new(i, v)).collect()
    }

    #[test]
    fn filter_by_status_and_domain_finds_john_doe() {
        let requests: Vec<StudentRequest> = Dataset::Requests.load_as().unwrap();
        let c = FilterCriteria::new().with("status", "pending").with("domain", "Machine Learning");
        let hits = filter(&requests, &c);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].student_name, "John Doe");
    }

    #[test]
    fn unconstrained_filter_is_identity() {
        let ts = tasks();
        let all = filter(&ts, &FilterCriteria::new());
        assert_eq!(all.len(), ts.len());
        let all2 = filter(&ts, &FilterCriteria::new().with("status", "all").with("priority", "all"));
        assert!(all2.iter().zip(ts.iter()).all(|(a, b)| std::ptr::eq(*a, b)));
    }

    #[test]
    fn filter_preserves_order_and_fails_closed() {
        let recs = dyns(&[
            json!({"status": "pending", "n": 1}),
            json!({"n": 2}),
            json!({"status": "pending", "n": 3}),
            json!({"status": ["pending"], "n": 4}),
        ]);
        let hits = filter(&recs, &FilterCriteria::new().with("status", "pending"));
        let ns: Vec<_> = hits.iter().map(|r| r.field("n").and_then(|v| v.as_number())).collect();
        assert_eq!(ns, vec![Some(1.0), Some(3.0)]);
    }

    #[test]
    fn filter_matches_numbers_by_rendered_category() {
        let courses: Vec<Course> = Dataset::OptionalCourses.load_as().unwrap();
        let four = filter(&courses, &FilterCriteria::new().with("credits", "4"));
        assert_eq!(four.iter().map(|c| c.code.as_str()).collect::<Vec<_>>(), vec!["CS403", "CS405"]);
    }

    #[test]
    fn filter_is_case_sensitive() {
        let ts = tasks();
        assert!(filter(&ts, &FilterCriteria::new().with("status", "Pending")).is_empty());
    }

    #[test]
    fn summarize_counts_pending_and_completed() {
        let recs = dyns(&[json!({"status": "pending"}), json!({"status": "pending"}), json!({"status": "completed"})]);
        let s = summarize(&recs, &["status"]);
        let t = s.get("status").unwrap();
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![("pending", 2), ("completed", 1)]);
        assert_eq!(t.missing, 0);
    }

    #[test]
    fn summarize_sample_tasks_by_status_and_priority() {
        let ts = tasks();
        let s = summarize(&ts, &["status", "priority", "status"]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.count("status", "pending"), 3);
        assert_eq!(s.count("status", "in-progress"), 2);
        assert_eq!(s.count("status", "completed"), 0);
        assert_eq!(s.count("priority", "high"), 2);
        assert_eq!(s.get("priority").unwrap().total(), ts.len());
    }

    #[test]
    fn summarize_empty_gives_empty_tallies() {
        let none: Vec<Task> = Vec::new();
        let s = summarize(&none, &["status"]);
        let t = s.get("status").unwrap();
        assert!(t.is_empty());
        assert_eq!(t.total(), 0);
    }

    #[test]
    fn summarize_counts_missing_fields_separately() {
        let courses: Vec<Course> = Dataset::OptionalCourses.load_as().unwrap();
        let s = summarize(&courses, &["status", "category"]);
        let status = s.get("status").unwrap();
        assert!(status.is_empty());
        assert_eq!(status.missing, courses.len());
        assert_eq!(s.get("category").unwrap().len(), 6);
    }

    #[test]
    fn summarize_over_filtered_view() {
        let ts = tasks();
        let high = filter(&ts, &FilterCriteria::new().with("priority", "high"));
        let s = summarize(&high, &["status"]);
        assert_eq!(s.count("status", "pending"), 1);
        assert_eq!(s.count("status", "in-progress"), 1);
    }

    #[test]
    fn sum_by_credits() {
        let recs = dyns(&[json!({"credits": 4}), json!({"credits": 3}), json!({"credits": 3}), json!({"credits": 2})]);
        assert_eq!(sum_by(&recs, "credits").unwrap(), 12.0);
        let none: Vec<Course> = Vec::new();
        assert_eq!(sum_by(&none, "credits").unwrap(), 0.0);
        let current: Vec<Course> = Dataset::CurrentCourses.load_as().unwrap();
        assert_eq!(sum_by(&current, "credits").unwrap(), 12.0);
    }

    #[test]
    fn sum_by_rejects_text_and_defaults_missing() {
        let recs = dyns(&[json!({"id": 1, "credits": 4}), json!({"id": 2, "credits": "3"})]);
        assert_eq!(
            sum_by(&recs, "credits"),
            Err(QueryError::NonNumericField { field: "credits".into(), id: 2 })
        );
        let partial = dyns(&[json!({"credits": 4}), json!({})]);
        assert_eq!(sum_by(&partial, "credits").unwrap(), 4.0);
    }

    #[test]
    fn credit_plan_totals_per_semester() {
        let plan: Vec<Course> = Dataset::CreditPlan.load_as().unwrap();
        let totals = sum_by_group(&plan, "semester", "credits").unwrap();
        assert_eq!(
            totals,
            vec![
                ("Semester 1".to_string(), 12.0),
                ("Semester 2".to_string(), 12.0),
                ("Semester 3".to_string(), 12.0),
                ("Semester 4".to_string(), 12.0),
            ]
        );
        assert!(sum_by_group(&plan, "semester", "name").is_err());
    }

    #[test]
    fn distinct_values_keep_first_seen_order() {
        let requests: Vec<StudentRequest> = Dataset::Requests.load_as().unwrap();
        assert_eq!(
            distinct_values(&requests, "domain"),
            vec!["Machine Learning", "Web Development", "Mobile Development", "Blockchain"]
        );
        assert_eq!(distinct_values(&requests, "status"), vec!["pending", "accepted"]);
        assert!(distinct_values(&requests, "nope").is_empty());
    }

    #[test]
    fn roster_search_is_case_insensitive_over_fields() {
        let students: Vec<Student> = Dataset::Students.load_as().unwrap();
        let fields = ["name", "studentId", "project", "domain"];
        let hits = search(&students, "MOBILE", &fields);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Carol Davis");
        assert_eq!(search(&students, "stu2024", &fields).len(), 3);
        assert_eq!(search(&students, "   ", &fields).len(), 3);
        assert!(search(&students, "alice", &["domain"]).is_empty());
    }

    #[test]
    fn fuzzy_search_ranks_and_limits() {
        let students: Vec<Student> = Dataset::Students.load_as().unwrap();
        let hits = fuzzy_search(&students, "Carol", &["name", "project"], 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 2);
        assert!(fuzzy_search(&students, "zzqx", &["name"], 10).is_empty());
        let blank = fuzzy_search(&students, "", &["name"], 2);
        assert_eq!(blank.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 1]);
    }
}
