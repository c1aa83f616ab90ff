//! Domain primitives, services and ports for proposal moderation.
//!
//! Purpose: model change proposals and their lifecycle independently of HTTP
//! and storage. Inbound adapters call the driving ports in [`ports`];
//! outbound adapters implement the driven ones.
//!
//! Public surface:
//! - [`ChangeProposal`] and its value types (identifiers, statuses, audit).
//! - [`ModerationService`] for approve, reject, edit-approve, undo and batch.
//! - [`IntakeService`] for opening proposals with a captured snapshot.
//! - [`TargetLocks`] and [`SnapshotStore`] shared by both services.
//! - [`Error`] and [`ErrorCode`], the transport-neutral failure payload.

pub mod actor;
pub mod error;
pub mod intake_service;
pub mod moderation_service;
mod payload;
pub mod ports;
pub mod proposal;
pub mod record_schema;
pub mod snapshot_store;
pub mod target_lock;
pub mod trace_id;

pub use self::actor::{Actor, ActorId, ActorRole, UnknownRoleError};
pub use self::error::{Error, ErrorCode};
pub use self::intake_service::IntakeService;
pub use self::moderation_service::{ModerationService, ModerationSettings};
pub use self::proposal::{
    AuditStamp, ChangeProposal, ChangeType, Confidence, ConfidenceError, FieldMap,
    IdentifierError, Operation, ParseEnumError, ProposalDraft, ProposalId, ProposalStatus,
    RecordId, SourceReference, TargetRef, TargetTable, TransitionError,
};
pub use self::record_schema::{
    Completeness, FieldKind, FieldSpec, RecordSchema, SchemaViolation, schema_for,
    schema_for_table,
};
pub use self::snapshot_store::SnapshotStore;
pub use self::target_lock::{TargetGuard, TargetLocks};
pub use self::trace_id::TraceId;

/// HTTP header carrying the request trace identifier.
pub const TRACE_ID_HEADER: &str = "trace-id";
