//! Composed list-view query: criteria, then search, then counts.

use campus_core::{FilterCriteria, Record, SummaryCounts};

use crate::{filter, search, summarize};

/// Which records feed the summary counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryScope {
    /// Stat cards over the whole collection, regardless of filters.
    #[default]
    Collection,
    /// Counts over what the view currently shows.
    Filtered,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    criteria: FilterCriteria,
    term: Option<String>,
    search_fields: Vec<String>,
    summary_fields: Vec<String>,
    scope: SummaryScope,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueryDebugInfo {
    pub total: usize,
    pub after_criteria: usize,
    pub after_search: usize,
}

#[derive(Debug)]
pub struct QueryOutcome<'a, R> {
    pub items: Vec<&'a R>,
    pub summary: SummaryCounts,
    pub debug: QueryDebugInfo,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn criteria(mut self, criteria: FilterCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn search<S: Into<String>>(mut self, term: impl Into<String>, fields: impl IntoIterator<Item = S>) -> Self {
        self.term = Some(term.into());
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn summarize<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.summary_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn scope(mut self, scope: SummaryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn run<'a, R: Record>(&self, records: &'a [R]) -> QueryOutcome<'a, R> {
        let started = std::time::Instant::now();
        let mut items = filter(records, &self.criteria);
        let after_criteria = items.len();

        if let Some(term) = self.term.as_deref() {
            let fields: Vec<&str> = self.search_fields.iter().map(String::as_str).collect();
            let found: Vec<&'a R> = search(&items, term, &fields).into_iter().copied().collect();
            items = found;
        }
        let after_search = items.len();

        let fields: Vec<&str> = self.summary_fields.iter().map(String::as_str).collect();
        let summary = match self.scope {
            SummaryScope::Collection => summarize(records, &fields),
            SummaryScope::Filtered => summarize(&items, &fields),
        };

        metrics::histogram!("query_eval_ms", started.elapsed().as_secs_f64() * 1_000.0);
        QueryOutcome {
            items,
            summary,
            debug: QueryDebugInfo { total: records.len(), after_criteria, after_search },
        }
    }
}
