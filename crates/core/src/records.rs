//! Record shapes displayed by the portal, plus a JSON-backed record for
//! collections without a fixed schema.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize, Serializer};

use crate::fields::{RecordKind, Schema};
use crate::{CoreError, FieldValue, Record, RecordId, RecordMut};

fn text(s: &str) -> Option<FieldValue<'_>> {
    Some(FieldValue::Text(s))
}

fn opt_text(s: &Option<String>) -> Option<FieldValue<'_>> {
    s.as_deref().map(FieldValue::Text)
}

fn parse_num<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, CoreError> {
    value.trim().parse::<T>().map_err(|_| CoreError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn immutable(field: &str, value: &str) -> CoreError {
    CoreError::InvalidValue { field: field.to_string(), value: value.to_string() }
}

fn unknown(field: &str) -> CoreError {
    CoreError::UnknownField { field: field.to_string() }
}

/// A course as listed in the curriculum, elective catalogue, current
/// semester or credit plan. Views fill different subsets of the optional
/// fields; absent ones never match a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: RecordId,
    pub name: String,
    pub code: String,
    pub credits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    /// `mandatory`, `elective`, `project`, `certification`, ...
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
}

impl Schema for Course {
    const KIND: RecordKind = RecordKind::Course;
}

impl Record for Course {
    fn id(&self) -> RecordId {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "id" => Some(FieldValue::Number(self.id as f64)),
            "name" => text(&self.name),
            "code" => text(&self.code),
            "credits" => Some(FieldValue::Number(self.credits as f64)),
            "instructor" => opt_text(&self.instructor),
            "type" => opt_text(&self.kind),
            "semester" => opt_text(&self.semester),
            "status" => opt_text(&self.status),
            "category" => opt_text(&self.category),
            "difficulty" => opt_text(&self.difficulty),
            "duration" => opt_text(&self.duration),
            "schedule" => opt_text(&self.schedule),
            "room" => opt_text(&self.room),
            "progress" => self.progress.map(|p| FieldValue::Number(p as f64)),
            "description" => opt_text(&self.description),
            "prerequisites" => Some(FieldValue::Opaque),
            _ => None,
        }
    }
}

impl RecordMut for Course {
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), CoreError> {
        let slot = match name {
            "name" => {
                self.name = value.to_string();
                return Ok(());
            }
            "code" => {
                self.code = value.to_string();
                return Ok(());
            }
            "credits" => {
                self.credits = parse_num(name, value)?;
                return Ok(());
            }
            "progress" => {
                self.progress = Some(parse_num(name, value)?);
                return Ok(());
            }
            "instructor" => &mut self.instructor,
            "type" => &mut self.kind,
            "semester" => &mut self.semester,
            "status" => &mut self.status,
            "category" => &mut self.category,
            "difficulty" => &mut self.difficulty,
            "duration" => &mut self.duration,
            "schedule" => &mut self.schedule,
            "room" => &mut self.room,
            "description" => &mut self.description,
            "id" | "prerequisites" => return Err(immutable(name, value)),
            _ => return Err(unknown(name)),
        };
        *slot = Some(value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    pub description: String,
    pub due_date: String,
    /// `high`, `medium`, `low`
    pub priority: String,
    pub category: String,
    /// `pending`, `in-progress`, `completed`
    pub status: String,
    pub course: String,
}

impl Schema for Task {
    const KIND: RecordKind = RecordKind::Task;
}

impl Record for Task {
    fn id(&self) -> RecordId {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "id" => Some(FieldValue::Number(self.id as f64)),
            "title" => text(&self.title),
            "description" => text(&self.description),
            "dueDate" => text(&self.due_date),
            "priority" => text(&self.priority),
            "category" => text(&self.category),
            "status" => text(&self.status),
            "course" => text(&self.course),
            _ => None,
        }
    }
}

impl RecordMut for Task {
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), CoreError> {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "dueDate" => &mut self.due_date,
            "priority" => &mut self.priority,
            "category" => &mut self.category,
            "status" => &mut self.status,
            "course" => &mut self.course,
            "id" => return Err(immutable(name, value)),
            _ => return Err(unknown(name)),
        };
        *slot = value.to_string();
        Ok(())
    }
}

/// A student's request for project supervision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRequest {
    pub id: RecordId,
    pub student_name: String,
    pub student_id: String,
    pub domain: String,
    pub project_title: String,
    pub description: String,
    pub request_date: String,
    /// `pending`, `accepted`, `rejected`
    pub status: String,
    pub priority: String,
    pub semester: String,
}

impl Schema for StudentRequest {
    const KIND: RecordKind = RecordKind::Request;
}

impl Record for StudentRequest {
    fn id(&self) -> RecordId {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "id" => Some(FieldValue::Number(self.id as f64)),
            "studentName" => text(&self.student_name),
            "studentId" => text(&self.student_id),
            "domain" => text(&self.domain),
            "projectTitle" => text(&self.project_title),
            "description" => text(&self.description),
            "requestDate" => text(&self.request_date),
            "status" => text(&self.status),
            "priority" => text(&self.priority),
            "semester" => text(&self.semester),
            _ => None,
        }
    }
}

impl RecordMut for StudentRequest {
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), CoreError> {
        let slot = match name {
            "studentName" => &mut self.student_name,
            "studentId" => &mut self.student_id,
            "domain" => &mut self.domain,
            "projectTitle" => &mut self.project_title,
            "description" => &mut self.description,
            "requestDate" => &mut self.request_date,
            "status" => &mut self.status,
            "priority" => &mut self.priority,
            "semester" => &mut self.semester,
            "id" => return Err(immutable(name, value)),
            _ => return Err(unknown(name)),
        };
        *slot = value.to_string();
        Ok(())
    }
}

/// A supervised student on the faculty roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: RecordId,
    pub name: String,
    pub student_id: String,
    pub email: String,
    pub phone: String,
    pub semester: String,
    pub project: String,
    pub domain: String,
    pub start_date: String,
    pub progress: u8,
    /// `active`, `completed`, `on-hold`
    pub status: String,
}

impl Schema for Student {
    const KIND: RecordKind = RecordKind::Student;
}

impl Record for Student {
    fn id(&self) -> RecordId {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "id" => Some(FieldValue::Number(self.id as f64)),
            "name" => text(&self.name),
            "studentId" => text(&self.student_id),
            "email" => text(&self.email),
            "phone" => text(&self.phone),
            "semester" => text(&self.semester),
            "project" => text(&self.project),
            "domain" => text(&self.domain),
            "startDate" => text(&self.start_date),
            "progress" => Some(FieldValue::Number(self.progress as f64)),
            "status" => text(&self.status),
            _ => None,
        }
    }
}

impl RecordMut for Student {
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), CoreError> {
        let slot = match name {
            "progress" => {
                let p: u8 = parse_num(name, value)?;
                if p > 100 {
                    return Err(immutable(name, value));
                }
                self.progress = p;
                return Ok(());
            }
            "name" => &mut self.name,
            "studentId" => &mut self.student_id,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "semester" => &mut self.semester,
            "project" => &mut self.project,
            "domain" => &mut self.domain,
            "startDate" => &mut self.start_date,
            "status" => &mut self.status,
            "id" => return Err(immutable(name, value)),
            _ => return Err(unknown(name)),
        };
        *slot = value.to_string();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deadline {
    pub id: RecordId,
    pub course: String,
    pub assignment: String,
    pub due_date: String,
    pub priority: String,
}

impl Schema for Deadline {
    const KIND: RecordKind = RecordKind::Deadline;
}

impl Record for Deadline {
    fn id(&self) -> RecordId {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "id" => Some(FieldValue::Number(self.id as f64)),
            "course" => text(&self.course),
            "assignment" => text(&self.assignment),
            "dueDate" => text(&self.due_date),
            "priority" => text(&self.priority),
            _ => None,
        }
    }
}

impl RecordMut for Deadline {
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), CoreError> {
        let slot = match name {
            "course" => &mut self.course,
            "assignment" => &mut self.assignment,
            "dueDate" => &mut self.due_date,
            "priority" => &mut self.priority,
            "id" => return Err(immutable(name, value)),
            _ => return Err(unknown(name)),
        };
        *slot = value.to_string();
        Ok(())
    }
}

/// Record backed by an arbitrary JSON object.
///
/// Identity comes from a numeric `id` key, falling back to the position the
/// record was loaded at. Dotted names address nested keys (`a.b` -> `/a/b`).
#[derive(Debug, Clone, PartialEq)]
pub struct DynRecord {
    id: RecordId,
    raw: serde_json::Value,
}

impl DynRecord {
    pub fn new(position: usize, raw: serde_json::Value) -> Self {
        let id = raw.get("id").and_then(|v| v.as_u64()).unwrap_or(position as RecordId);
        Self { id, raw }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    fn lookup(&self, name: &str) -> Option<&serde_json::Value> {
        if name.contains('.') {
            let pointer = format!("/{}", name.replace('.', "/"));
            self.raw.pointer(&pointer)
        } else {
            self.raw.get(name)
        }
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut serde_json::Value> {
        if name.contains('.') {
            let pointer = format!("/{}", name.replace('.', "/"));
            self.raw.pointer_mut(&pointer)
        } else {
            self.raw.get_mut(name)
        }
    }
}

impl Serialize for DynRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl Record for DynRecord {
    fn id(&self) -> RecordId {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        use serde_json::Value;
        match self.lookup(name)? {
            Value::Null => None,
            Value::String(s) => Some(FieldValue::Text(s)),
            Value::Number(n) => n.as_f64().map(FieldValue::Number),
            _ => Some(FieldValue::Opaque),
        }
    }
}

impl RecordMut for DynRecord {
    /// Existing numeric fields stay numeric; everything else is stored as a string.
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), CoreError> {
        use serde_json::Value;
        if name == "id" {
            return Err(immutable(name, value));
        }
        if let Some(slot) = self.lookup_mut(name) {
            let next = match slot {
                Value::Number(_) => {
                    let n: f64 = parse_num(name, value)?;
                    serde_json::Number::from_f64(n).map(Value::Number).ok_or_else(|| immutable(name, value))?
                }
                Value::Array(_) | Value::Object(_) => return Err(immutable(name, value)),
                _ => Value::String(value.to_string()),
            };
            *slot = next;
            return Ok(());
        }
        match self.raw.as_object_mut() {
            Some(obj) if !name.contains('.') => {
                obj.insert(name.to_string(), Value::String(value.to_string()));
                Ok(())
            }
            _ => Err(unknown(name)),
        }
    }
}
