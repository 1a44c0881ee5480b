//! Data sources: the portal's built-in sample collections and JSON files.
//!
//! Every source hands back a fully materialized `Vec`; nothing here is lazy.

#![forbid(unsafe_code)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::fields::{RecordKind, Schema};
use crate::records::DynRecord;
use crate::CoreError;

pub trait DataSource<R> {
    fn load(&self) -> Result<Vec<R>, CoreError>;
}

/// Built-in sample collections, one per portal list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    MandatoryCourses,
    OptionalCourses,
    CurrentCourses,
    CreditPlan,
    Deadlines,
    Tasks,
    Requests,
    Students,
}

impl Dataset {
    pub const ALL: [Dataset; 8] = [
        Dataset::MandatoryCourses,
        Dataset::OptionalCourses,
        Dataset::CurrentCourses,
        Dataset::CreditPlan,
        Dataset::Deadlines,
        Dataset::Tasks,
        Dataset::Requests,
        Dataset::Students,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::MandatoryCourses => "mandatory-courses",
            Dataset::OptionalCourses => "optional-courses",
            Dataset::CurrentCourses => "current-courses",
            Dataset::CreditPlan => "credit-plan",
            Dataset::Deadlines => "deadlines",
            Dataset::Tasks => "tasks",
            Dataset::Requests => "requests",
            Dataset::Students => "students",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Dataset::MandatoryCourses => "core curriculum courses",
            Dataset::OptionalCourses => "elective catalogue",
            Dataset::CurrentCourses => "courses taken this semester",
            Dataset::CreditPlan => "courses per semester in the credit structure",
            Dataset::Deadlines => "upcoming assignment deadlines",
            Dataset::Tasks => "student task list",
            Dataset::Requests => "project supervision requests",
            Dataset::Students => "supervised students",
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Dataset::MandatoryCourses
            | Dataset::OptionalCourses
            | Dataset::CurrentCourses
            | Dataset::CreditPlan => RecordKind::Course,
            Dataset::Deadlines => RecordKind::Deadline,
            Dataset::Tasks => RecordKind::Task,
            Dataset::Requests => RecordKind::Request,
            Dataset::Students => RecordKind::Student,
        }
    }

    fn raw_json(&self) -> &'static str {
        match self {
            Dataset::MandatoryCourses => include_str!("../data/mandatory_courses.json"),
            Dataset::OptionalCourses => include_str!("../data/optional_courses.json"),
            Dataset::CurrentCourses => include_str!("../data/current_courses.json"),
            Dataset::CreditPlan => include_str!("../data/credit_plan.json"),
            Dataset::Deadlines => include_str!("../data/deadlines.json"),
            Dataset::Tasks => include_str!("../data/tasks.json"),
            Dataset::Requests => include_str!("../data/requests.json"),
            Dataset::Students => include_str!("../data/students.json"),
        }
    }

    /// Load as typed records. `R` must be the record type for `self.kind()`.
    pub fn load_as<R: DeserializeOwned + Schema>(&self) -> Result<Vec<R>, CoreError> {
        if R::KIND != self.kind() {
            return Err(CoreError::DatasetKind { dataset: self.name().to_string(), kind: R::KIND });
        }
        let items: Vec<R> = serde_json::from_str(self.raw_json())
            .map_err(|source| CoreError::Parse { origin: self.name().to_string(), source })?;
        debug!(dataset = self.name(), items = items.len(), "loaded built-in dataset");
        Ok(items)
    }

    /// Load without a schema, as the CLI does for ad hoc exploration.
    pub fn load_dyn(&self) -> Result<Vec<DynRecord>, CoreError> {
        parse_dyn(self.raw_json(), self.name())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .iter()
            .copied()
            .find(|d| d.name() == s)
            .ok_or_else(|| CoreError::UnknownDataset(s.to_string()))
    }
}

impl<R: DeserializeOwned + Schema> DataSource<R> for Dataset {
    fn load(&self) -> Result<Vec<R>, CoreError> {
        self.load_as()
    }
}

/// A JSON file holding an array of objects.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource<DynRecord> for JsonFileSource {
    fn load(&self) -> Result<Vec<DynRecord>, CoreError> {
        let origin = self.path.display().to_string();
        let text = std::fs::read_to_string(&self.path).map_err(|source| CoreError::Io { path: origin.clone(), source })?;
        parse_dyn(&text, &origin)
    }
}

/// Parse a JSON array of objects into records, keyed by position when no `id` is present.
pub fn parse_dyn(text: &str, origin: &str) -> Result<Vec<DynRecord>, CoreError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|source| CoreError::Parse { origin: origin.to_string(), source })?;
    let serde_json::Value::Array(items) = value else {
        return Err(CoreError::NotAnArray { origin: origin.to_string() });
    };
    if items.iter().any(|v| !v.is_object()) {
        return Err(CoreError::NotAnArray { origin: origin.to_string() });
    }
    let out: Vec<DynRecord> = items.into_iter().enumerate().map(|(i, v)| DynRecord::new(i, v)).collect();
    debug!(origin, items = out.len(), "parsed JSON records");
    Ok(out)
}
