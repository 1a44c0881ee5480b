//! Campus core types: records, field values, filter criteria and summary counts.

#![forbid(unsafe_code)]

use std::borrow::Cow;

use serde::ser::{Serialize, SerializeMap, Serializer};
use smallvec::SmallVec;

pub mod fields;
pub mod records;
pub mod source;

pub use fields::{FieldKind, FieldSpec, FieldUsage, RecordKind, Schema, SchemaError};
pub use records::{Course, Deadline, DynRecord, Student, StudentRequest, Task};
pub use source::{parse_dyn, DataSource, Dataset, JsonFileSource};

pub type RecordId = u64;

/// Sentinel selection meaning "no constraint on this field".
pub const ALL: &str = "all";

pub mod prelude {
    pub use super::{
        FieldValue, FilterCriteria, Record, RecordId, RecordMut, Selection, SummaryCounts, Tally,
    };
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid record data in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("expected a JSON array of objects in {origin}")]
    NotAnArray { origin: String },
    #[error("unknown field `{field}`")]
    UnknownField { field: String },
    #[error("field `{field}` does not accept value `{value}`")]
    InvalidValue { field: String, value: String },
    #[error("malformed criterion `{0}`; expected field=value")]
    MalformedCriterion(String),
    #[error("unknown dataset `{0}`")]
    UnknownDataset(String),
    #[error("dataset `{dataset}` does not hold {kind} records")]
    DatasetKind { dataset: String, kind: RecordKind },
}

/// A single attribute as seen by the query engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    /// Present, but neither text nor number (lists, flags, nested objects).
    Opaque,
}

impl<'a> FieldValue<'a> {
    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match *self {
            FieldValue::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Category used for filtering and grouping. Numbers render canonically
    /// (`3`, not `3.0`); opaque values have none.
    pub fn category(&self) -> Option<Cow<'a, str>> {
        match *self {
            FieldValue::Text(s) => Some(Cow::Borrowed(s)),
            FieldValue::Number(n) => Some(Cow::Owned(render_number(n))),
            FieldValue::Opaque => None,
        }
    }
}

pub fn render_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// An item in a displayed collection.
pub trait Record {
    fn id(&self) -> RecordId;
    /// Look up a field by name. `None` when the record has no such field.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

impl<R: Record + ?Sized> Record for &R {
    fn id(&self) -> RecordId {
        (**self).id()
    }
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        (**self).field(name)
    }
}

/// Records that accept in-place edits from the collection store.
pub trait RecordMut: Record {
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), CoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selection {
    All,
    Is(String),
}

impl Selection {
    pub fn value(&self) -> Option<&str> {
        match self {
            Selection::All => None,
            Selection::Is(v) => Some(v.as_str()),
        }
    }
}

impl From<&str> for Selection {
    fn from(s: &str) -> Self {
        if s == ALL { Selection::All } else { Selection::Is(s.to_string()) }
    }
}

impl From<String> for Selection {
    fn from(s: String) -> Self {
        if s == ALL { Selection::All } else { Selection::Is(s) }
    }
}

/// Active field constraints for a view. Conjunctive; insertion ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pairs: SmallVec<[(String, Selection); 4]>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, selection: impl Into<Selection>) -> Self {
        self.set(field, selection);
        self
    }

    /// Set or replace the selection for `field`.
    pub fn set(&mut self, field: impl Into<String>, selection: impl Into<Selection>) {
        let field = field.into();
        let selection = selection.into();
        if let Some(slot) = self.pairs.iter_mut().find(|(f, _)| *f == field) {
            slot.1 = selection;
        } else {
            self.pairs.push((field, selection));
        }
    }

    pub fn get(&self, field: &str) -> Option<&Selection> {
        self.pairs.iter().find(|(f, _)| f == field).map(|(_, s)| s)
    }

    /// Parse and apply a `field=value` pair.
    pub fn push_pair(&mut self, raw: &str) -> Result<(), CoreError> {
        let (field, value) = raw
            .split_once('=')
            .map(|(f, v)| (f.trim(), v.trim()))
            .filter(|(f, _)| !f.is_empty())
            .ok_or_else(|| CoreError::MalformedCriterion(raw.to_string()))?;
        self.set(field, value);
        Ok(())
    }

    pub fn parse_pairs<'a>(raw: impl IntoIterator<Item = &'a str>) -> Result<Self, CoreError> {
        let mut out = Self::new();
        for pair in raw {
            out.push_pair(pair)?;
        }
        Ok(out)
    }

    /// Constrained `(field, value)` pairs; `All` selections are skipped.
    pub fn active(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .filter_map(|(f, s)| s.value().map(|v| (f.as_str(), v)))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(f, _)| f.as_str())
    }

    pub fn is_unconstrained(&self) -> bool {
        self.active().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<Selection>> FromIterator<(K, V)> for FilterCriteria {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.set(k, v);
        }
        out
    }
}

/// Per-field distribution: distinct category -> count, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    entries: SmallVec<[(String, usize); 8]>,
    /// Records that had no category for the field.
    pub missing: usize,
}

impl Tally {
    pub fn from_counts(entries: impl IntoIterator<Item = (String, usize)>, missing: usize) -> Self {
        Self { entries: entries.into_iter().collect(), missing }
    }

    /// Count for `value`; 0 when never observed.
    pub fn get(&self, value: &str) -> usize {
        self.entries
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(v, c)| (v.as_str(), *c))
    }

    /// Sum of all bucket counts (excludes `missing`).
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| *c).sum()
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (v, c) in self.entries.iter() {
            map.serialize_entry(v, c)?;
        }
        map.end()
    }
}

/// Field name -> Tally, in the order the fields were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryCounts {
    fields: SmallVec<[(String, Tally); 4]>,
}

impl SummaryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, tally: Tally) {
        let field = field.into();
        if let Some(slot) = self.fields.iter_mut().find(|(f, _)| *f == field) {
            slot.1 = tally;
        } else {
            self.fields.push((field, tally));
        }
    }

    pub fn get(&self, field: &str) -> Option<&Tally> {
        self.fields.iter().find(|(f, _)| f == field).map(|(_, t)| t)
    }

    /// Count of `value` under `field`; 0 for unknown fields or values.
    pub fn count(&self, field: &str, value: &str) -> usize {
        self.get(field).map(|t| t.get(value)).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tally)> {
        self.fields.iter().map(|(f, t)| (f.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for SummaryCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (f, t) in self.fields.iter() {
            map.serialize_entry(f, t)?;
        }
        map.end()
    }
}
