//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations under `backend/migrations`.
//! Regenerate with `diesel print-schema` after changing a migration.

diesel::table! {
    /// Change proposals and their moderation audit trail.
    ///
    /// Rows are never deleted. `version` is the optimistic concurrency token
    /// every status transition checks and increments.
    change_proposals (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Record kind (`action`, `risk`, ...).
        change_type -> Varchar,
        /// `create`, `update` or `delete`.
        operation -> Varchar,
        /// Table holding the target record.
        target_table -> Varchar,
        /// Target record; null for creates until applied.
        target_id -> Nullable<Varchar>,
        /// Proposed field values.
        payload -> Jsonb,
        /// Fields captured at intake for updates and deletes. Written once.
        old_snapshot -> Nullable<Jsonb>,
        /// Extraction provenance.
        source_reference -> Nullable<Jsonb>,
        /// Extraction confidence in `[0, 1]`.
        confidence -> Float8,
        /// Lifecycle status.
        status -> Varchar,
        /// Optimistic concurrency version, starting at 1.
        version -> Int4,
        created_by -> Uuid,
        created_at -> Timestamptz,
        approved_by -> Nullable<Uuid>,
        approved_at -> Nullable<Timestamptz>,
        applied_by -> Nullable<Uuid>,
        applied_at -> Nullable<Timestamptz>,
        rejected_by -> Nullable<Uuid>,
        rejected_at -> Nullable<Timestamptz>,
        reverted_by -> Nullable<Uuid>,
        reverted_at -> Nullable<Timestamptz>,
        edited_by -> Nullable<Uuid>,
        edited_at -> Nullable<Timestamptz>,
        /// Last apply or undo failure.
        error -> Nullable<Text>,
        /// Time of the last transition.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Canonical project records targeted by proposals.
    ///
    /// One table holds every record kind; `table_name` names the logical
    /// table and `fields` the JSON object validated against its schema.
    project_records (table_name, record_id) {
        /// Logical table (`actions`, `risks`, ...).
        table_name -> Varchar,
        /// Record identifier, unique within `table_name`.
        record_id -> Varchar,
        /// Record fields as a JSON object.
        fields -> Jsonb,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}
