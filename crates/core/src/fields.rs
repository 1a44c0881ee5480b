//! Field registry for the portal's record kinds.
//!
//! This module provides:
//! - Static field specs (name, label, kind) per record kind
//! - Call-boundary validation of field names against a usage

#![forbid(unsafe_code)]

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Course,
    Task,
    Request,
    Student,
    Deadline,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Course => "course",
            RecordKind::Task => "task",
            RecordKind::Request => "request",
            RecordKind::Student => "student",
            RecordKind::Deadline => "deadline",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Identity,
    Categorical,
    Numeric,
    /// Free text: searchable, not useful for grouping.
    Text,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUsage {
    Filter,
    Group,
    Sum,
    Search,
}

impl FieldUsage {
    fn accepts(self, kind: FieldKind) -> bool {
        match self {
            // Identity is only reachable by naming it.
            FieldUsage::Filter | FieldUsage::Group => matches!(kind, Id | Cat | Num | Text),
            FieldUsage::Sum => kind == Num,
            FieldUsage::Search => matches!(kind, Cat | Text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{kind} records have no field `{field}`")]
    FieldMissing { kind: RecordKind, field: String },
    #[error("field `{field}` of {kind} records cannot be used for {usage:?}")]
    WrongKind { kind: RecordKind, field: String, usage: FieldUsage },
}

/// Typed records that know their field registry.
pub trait Schema {
    const KIND: RecordKind;
}

const fn f(name: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, label, kind }
}

use FieldKind::{Categorical as Cat, Identity as Id, List, Numeric as Num, Text};

const COURSE_FIELDS: &[FieldSpec] = &[
    f("id", "ID", Id),
    f("name", "Name", Text),
    f("code", "Code", Cat),
    f("credits", "Credits", Num),
    f("instructor", "Instructor", Cat),
    f("type", "Type", Cat),
    f("semester", "Semester", Cat),
    f("status", "Status", Cat),
    f("category", "Category", Cat),
    f("difficulty", "Difficulty", Cat),
    f("duration", "Duration", Cat),
    f("schedule", "Schedule", Text),
    f("room", "Room", Cat),
    f("progress", "Progress", Num),
    f("description", "Description", Text),
    f("prerequisites", "Prerequisites", List),
];

const TASK_FIELDS: &[FieldSpec] = &[
    f("id", "ID", Id),
    f("title", "Title", Text),
    f("description", "Description", Text),
    f("dueDate", "Due", Cat),
    f("priority", "Priority", Cat),
    f("category", "Category", Cat),
    f("status", "Status", Cat),
    f("course", "Course", Cat),
];

const REQUEST_FIELDS: &[FieldSpec] = &[
    f("id", "ID", Id),
    f("studentName", "Student", Text),
    f("studentId", "Student ID", Text),
    f("domain", "Domain", Cat),
    f("projectTitle", "Project", Text),
    f("description", "Description", Text),
    f("requestDate", "Requested", Cat),
    f("status", "Status", Cat),
    f("priority", "Priority", Cat),
    f("semester", "Semester", Cat),
];

const STUDENT_FIELDS: &[FieldSpec] = &[
    f("id", "ID", Id),
    f("name", "Name", Text),
    f("studentId", "Student ID", Text),
    f("email", "Email", Text),
    f("phone", "Phone", Text),
    f("semester", "Semester", Cat),
    f("project", "Project", Text),
    f("domain", "Domain", Cat),
    f("startDate", "Started", Cat),
    f("progress", "Progress", Num),
    f("status", "Status", Cat),
];

const DEADLINE_FIELDS: &[FieldSpec] = &[
    f("id", "ID", Id),
    f("course", "Course", Cat),
    f("assignment", "Assignment", Text),
    f("dueDate", "Due", Cat),
    f("priority", "Priority", Cat),
];

/// Full field set for a record kind.
pub fn fields_for(kind: RecordKind) -> &'static [FieldSpec] {
    match kind {
        RecordKind::Course => COURSE_FIELDS,
        RecordKind::Task => TASK_FIELDS,
        RecordKind::Request => REQUEST_FIELDS,
        RecordKind::Student => STUDENT_FIELDS,
        RecordKind::Deadline => DEADLINE_FIELDS,
    }
}

pub fn lookup(kind: RecordKind, name: &str) -> Option<&'static FieldSpec> {
    fields_for(kind).iter().find(|s| s.name == name)
}

/// Validate `name` for `usage` before handing it to the engine.
pub fn check_field(kind: RecordKind, name: &str, usage: FieldUsage) -> Result<&'static FieldSpec, SchemaError> {
    let spec = lookup(kind, name).ok_or_else(|| SchemaError::FieldMissing { kind, field: name.to_string() })?;
    if !usage.accepts(spec.kind) {
        return Err(SchemaError::WrongKind { kind, field: name.to_string(), usage });
    }
    Ok(spec)
}

/// Text-bearing fields searched when the caller names none.
pub fn default_search_fields(kind: RecordKind) -> Vec<&'static str> {
    fields_for(kind)
        .iter()
        .filter(|s| matches!(s.kind, Text | Cat) && s.name != "description")
        .map(|s| s.name)
        .collect()
}
