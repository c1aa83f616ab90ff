//! Field schemas for the project record kinds proposals can target.
//!
//! Intake performs a shape check (known fields, value types) so malformed
//! extraction output is refused up front. Gateways perform the complete check
//! (required fields plus references to other records) inside the write
//! transaction, which is why references are returned to the caller rather than
//! resolved here.

use chrono::NaiveDate;
use serde_json::Value;

use crate::domain::{ChangeType, FieldMap, RecordId, TargetRef, TargetTable};

/// Value type accepted by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// One of a fixed set of strings.
    Enum(&'static [&'static str]),
    /// ISO-8601 calendar date (`YYYY-MM-DD`).
    Date,
    /// List of free-text tags.
    TextList,
    /// Identifier of a record in another table.
    Reference(&'static str),
}

impl FieldKind {
    fn describe(self) -> String {
        match self {
            Self::Text => "text".to_owned(),
            Self::Enum(values) => format!("one of {}", values.join(", ")),
            Self::Date => "a YYYY-MM-DD date".to_owned(),
            Self::TextList => "a list of text".to_owned(),
            Self::Reference(table) => format!("a {table} identifier"),
        }
    }
}

/// Declaration of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Wire name of the field.
    pub name: &'static str,
    /// Accepted value type.
    pub kind: FieldKind,
    /// Whether a complete record must carry a non-null value.
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
    }
}

/// How strictly a field map is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    /// Only fields that are present are checked.
    Partial,
    /// Required fields must also be present and non-null.
    Complete,
}

/// Ways a field map can violate its schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    /// The field is not declared for this record kind.
    #[error("unknown field `{field}` for {kind} records")]
    UnknownField {
        /// Offending field.
        field: String,
        /// Record kind being validated.
        kind: ChangeType,
    },
    /// A required field is absent or null.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Offending field.
        field: String,
    },
    /// The value does not match the declared type.
    #[error("field `{field}` must be {expected}")]
    InvalidValue {
        /// Offending field.
        field: String,
        /// Description of the accepted values.
        expected: String,
    },
}

impl SchemaViolation {
    /// Field the violation concerns.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::UnknownField { field, .. }
            | Self::MissingField { field }
            | Self::InvalidValue { field, .. } => field,
        }
    }
}

/// Schema for one record kind.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordSchema {
    /// Record kind.
    pub change_type: ChangeType,
    /// Table holding records of this kind.
    pub table: &'static str,
    /// Declared fields.
    pub fields: &'static [FieldSpec],
}

const ACTION_STATUSES: &[&str] = &["open", "in_progress", "blocked", "done"];
const LEVELS: &[&str] = &["low", "medium", "high"];
const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];
const RISK_STATUSES: &[&str] = &["open", "mitigated", "closed"];
const DECISION_STATUSES: &[&str] = &["proposed", "agreed", "superseded"];
const INTEGRATION_STATUSES: &[&str] = &["planned", "in_progress", "live", "blocked"];
const WORKSTREAM_STATUSES: &[&str] = &["on_track", "at_risk", "off_track"];

static ACTION: RecordSchema = RecordSchema {
    change_type: ChangeType::Action,
    table: "actions",
    fields: &[
        required("title", FieldKind::Text),
        required("status", FieldKind::Enum(ACTION_STATUSES)),
        optional("owner", FieldKind::Text),
        optional("description", FieldKind::Text),
        optional("dueDate", FieldKind::Date),
        optional("workstreamId", FieldKind::Reference("workstreams")),
    ],
};

static RISK: RecordSchema = RecordSchema {
    change_type: ChangeType::Risk,
    table: "risks",
    fields: &[
        required("title", FieldKind::Text),
        required("severity", FieldKind::Enum(SEVERITIES)),
        optional("likelihood", FieldKind::Enum(LEVELS)),
        optional("mitigation", FieldKind::Text),
        optional("owner", FieldKind::Text),
        optional("status", FieldKind::Enum(RISK_STATUSES)),
        optional("workstreamId", FieldKind::Reference("workstreams")),
    ],
};

static DECISION: RecordSchema = RecordSchema {
    change_type: ChangeType::Decision,
    table: "decisions",
    fields: &[
        required("title", FieldKind::Text),
        optional("rationale", FieldKind::Text),
        optional("decidedBy", FieldKind::Text),
        optional("decidedOn", FieldKind::Date),
        optional("status", FieldKind::Enum(DECISION_STATUSES)),
    ],
};

static INTEGRATION: RecordSchema = RecordSchema {
    change_type: ChangeType::Integration,
    table: "integrations",
    fields: &[
        required("name", FieldKind::Text),
        optional("system", FieldKind::Text),
        optional("owner", FieldKind::Text),
        optional("status", FieldKind::Enum(INTEGRATION_STATUSES)),
        optional("workstreamId", FieldKind::Reference("workstreams")),
    ],
};

static WORKSTREAM: RecordSchema = RecordSchema {
    change_type: ChangeType::Workstream,
    table: "workstreams",
    fields: &[
        required("name", FieldKind::Text),
        optional("lead", FieldKind::Text),
        optional("description", FieldKind::Text),
        optional("status", FieldKind::Enum(WORKSTREAM_STATUSES)),
    ],
};

static MEMORY: RecordSchema = RecordSchema {
    change_type: ChangeType::Memory,
    table: "memories",
    fields: &[
        required("content", FieldKind::Text),
        optional("tags", FieldKind::TextList),
        optional("source", FieldKind::Text),
    ],
};

static SCHEMAS: [&RecordSchema; 6] = [
    &ACTION,
    &RISK,
    &DECISION,
    &INTEGRATION,
    &WORKSTREAM,
    &MEMORY,
];

/// Schema for a record kind.
#[must_use]
pub fn schema_for(change_type: ChangeType) -> &'static RecordSchema {
    match change_type {
        ChangeType::Action => &ACTION,
        ChangeType::Risk => &RISK,
        ChangeType::Decision => &DECISION,
        ChangeType::Integration => &INTEGRATION,
        ChangeType::Workstream => &WORKSTREAM,
        ChangeType::Memory => &MEMORY,
    }
}

/// Schema for the records stored in `table`, if the table is known.
#[must_use]
pub fn schema_for_table(table: &TargetTable) -> Option<&'static RecordSchema> {
    SCHEMAS
        .iter()
        .copied()
        .find(|schema| schema.table == table.as_str())
}

impl RecordSchema {
    /// Validate `fields`, returning the records they reference.
    ///
    /// # Errors
    /// Returns the first [`SchemaViolation`] encountered, checking unknown
    /// fields before declared ones.
    pub fn validate(
        &self,
        fields: &FieldMap,
        completeness: Completeness,
    ) -> Result<Vec<TargetRef>, SchemaViolation> {
        if let Some(unknown) = fields
            .keys()
            .find(|name| !self.fields.iter().any(|spec| spec.name == name.as_str()))
        {
            return Err(SchemaViolation::UnknownField {
                field: unknown.clone(),
                kind: self.change_type,
            });
        }

        let mut references = Vec::new();
        for spec in self.fields {
            match fields.get(spec.name) {
                None | Some(Value::Null) => {
                    if spec.required && completeness == Completeness::Complete {
                        return Err(SchemaViolation::MissingField {
                            field: spec.name.to_owned(),
                        });
                    }
                }
                Some(value) => {
                    if let Some(reference) = check_value(spec, value)? {
                        references.push(reference);
                    }
                }
            }
        }
        Ok(references)
    }
}

fn check_value(spec: &FieldSpec, value: &Value) -> Result<Option<TargetRef>, SchemaViolation> {
    let invalid = || SchemaViolation::InvalidValue {
        field: spec.name.to_owned(),
        expected: spec.kind.describe(),
    };
    match spec.kind {
        FieldKind::Text => match value.as_str() {
            Some(text) if !text.trim().is_empty() || !spec.required => Ok(None),
            _ => Err(invalid()),
        },
        FieldKind::Enum(allowed) => match value.as_str() {
            Some(text) if allowed.contains(&text) => Ok(None),
            _ => Err(invalid()),
        },
        FieldKind::Date => match value.as_str() {
            Some(text) if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok() => Ok(None),
            _ => Err(invalid()),
        },
        FieldKind::TextList => match value.as_array() {
            Some(items) if items.iter().all(Value::is_string) => Ok(None),
            _ => Err(invalid()),
        },
        FieldKind::Reference(table) => {
            let id = value
                .as_str()
                .and_then(|raw| RecordId::new(raw).ok())
                .ok_or_else(invalid)?;
            let table = TargetTable::new(table).map_err(|_| invalid())?;
            Ok(Some(TargetRef::new(table, id)))
        }
    }
}
