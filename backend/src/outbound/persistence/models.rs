//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{change_proposals, project_records};

/// Row struct for reading from the change_proposals table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = change_proposals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ProposalRow {
    pub id: Uuid,
    pub change_type: String,
    pub operation: String,
    pub target_table: String,
    pub target_id: Option<String>,
    pub payload: serde_json::Value,
    pub old_snapshot: Option<serde_json::Value>,
    pub source_reference: Option<serde_json::Value>,
    pub confidence: f64,
    pub status: String,
    pub version: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub applied_by: Option<Uuid>,
    pub applied_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<Uuid>,
    pub reverted_at: Option<DateTime<Utc>>,
    pub edited_by: Option<Uuid>,
    pub edited_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for opening a proposal.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = change_proposals)]
pub(crate) struct NewProposalRow<'a> {
    pub id: Uuid,
    pub change_type: &'a str,
    pub operation: &'a str,
    pub target_table: &'a str,
    pub target_id: Option<&'a str>,
    pub payload: serde_json::Value,
    pub old_snapshot: Option<serde_json::Value>,
    pub source_reference: Option<serde_json::Value>,
    pub confidence: f64,
    pub status: &'a str,
    pub version: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset applied by a compare-and-swap transition.
///
/// Identity, provenance and `old_snapshot` never change after intake. `None`
/// writes NULL, which is how a retried apply clears a stale error.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = change_proposals)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct ProposalTransition<'a> {
    pub target_id: Option<&'a str>,
    pub payload: serde_json::Value,
    pub status: &'a str,
    pub version: i32,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub applied_by: Option<Uuid>,
    pub applied_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<Uuid>,
    pub reverted_at: Option<DateTime<Utc>>,
    pub edited_by: Option<Uuid>,
    pub edited_at: Option<DateTime<Utc>>,
    pub error: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

/// Row struct for reading from the project_records table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = project_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RecordRow {
    pub fields: serde_json::Value,
}

/// Insertable struct for creating project records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = project_records)]
pub(crate) struct NewRecordRow<'a> {
    pub table_name: &'a str,
    pub record_id: &'a str,
    pub fields: &'a serde_json::Value,
}
