//! Change proposals and their status state machine.
//!
//! A [`ChangeProposal`] describes one mutation to a project record that
//! automated extraction wants to make. Proposals are never edited in place:
//! every transition method returns the next value of the proposal with the
//! version bumped, and the caller persists it with a compare-and-swap on the
//! previous version.
//!
//! ```text
//! pending ──claim──▶ approved ──▶ applied ──undo──▶ reverted
//!    │                  │
//!    │                  └──▶ failed ──claim──▶ approved
//!    └──reject──▶ rejected ◀──reject── failed
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::ActorId;

/// Field name to value mapping for a project record.
pub type FieldMap = Map<String, Value>;

/// Error returned when a wire string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Name of the enumeration being parsed.
    pub kind: &'static str,
    /// Rejected input.
    pub value: String,
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident as $kind:literal {
            $( $(#[$variant_meta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$variant_meta])* $variant ),+
        }

        impl $name {
            /// Wire representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok(Self::$variant), )+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// Semantic kind of project record a proposal affects.
    pub enum ChangeType as "change type" {
        /// Action item.
        Action => "action",
        /// Delivery risk.
        Risk => "risk",
        /// Recorded decision.
        Decision => "decision",
        /// System integration.
        Integration => "integration",
        /// Workstream.
        Workstream => "workstream",
        /// Free-form memory note.
        Memory => "memory",
    }
}

wire_enum! {
    /// Mutation a proposal performs.
    pub enum Operation as "operation" {
        /// Insert a new record.
        Create => "create",
        /// Replace the fields of an existing record.
        Update => "update",
        /// Remove an existing record.
        Delete => "delete",
    }
}

wire_enum! {
    /// Position of a proposal in the moderation lifecycle.
    pub enum ProposalStatus as "proposal status" {
        /// Awaiting review.
        Pending => "pending",
        /// Claimed by a reviewer; the apply is in flight.
        Approved => "approved",
        /// Applied to the target record.
        Applied => "applied",
        /// Dismissed by a reviewer. Terminal.
        Rejected => "rejected",
        /// The apply failed; may be edited and re-approved.
        Failed => "failed",
        /// Applied and later undone. Terminal.
        Reverted => "reverted",
    }
}

/// Unique, immutable proposal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(Uuid);

impl ProposalId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProposalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Validation failures for table names and record identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The value is empty once trimmed.
    #[error("{kind} must not be empty")]
    Empty {
        /// Which identifier was rejected.
        kind: &'static str,
    },
    /// The value exceeds the permitted length.
    #[error("{kind} must be at most {max} characters")]
    TooLong {
        /// Which identifier was rejected.
        kind: &'static str,
        /// Maximum length in characters.
        max: usize,
    },
    /// The value contains characters outside the permitted set.
    #[error("{kind} contains invalid characters: {value}")]
    InvalidCharacters {
        /// Which identifier was rejected.
        kind: &'static str,
        /// Rejected input.
        value: String,
    },
}

const TABLE_NAME_MAX: usize = 63;
const RECORD_ID_MAX: usize = 128;

/// Name of the table holding a target record.
///
/// Lower-case ASCII letters, digits and underscores, starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetTable(String);

impl TargetTable {
    /// Validate and wrap a table name.
    ///
    /// # Errors
    /// Returns [`IdentifierError`] for empty, over-long or malformed names.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        const KIND: &str = "target table";
        let raw = raw.into();
        let name = raw.trim();
        if name.is_empty() {
            return Err(IdentifierError::Empty { kind: KIND });
        }
        if name.chars().count() > TABLE_NAME_MAX {
            return Err(IdentifierError::TooLong {
                kind: KIND,
                max: TABLE_NAME_MAX,
            });
        }
        let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        let well_formed = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !starts_with_letter || !well_formed {
            return Err(IdentifierError::InvalidCharacters {
                kind: KIND,
                value: name.to_owned(),
            });
        }
        Ok(Self(name.to_owned()))
    }

    /// Borrow the table name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TargetTable {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetTable> for String {
    fn from(value: TargetTable) -> Self {
        value.0
    }
}

/// Identifier of a record within its table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Validate and wrap a record identifier.
    ///
    /// # Errors
    /// Returns [`IdentifierError`] for empty, over-long or control-character
    /// identifiers.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        const KIND: &str = "target id";
        let raw = raw.into();
        let id = raw.trim();
        if id.is_empty() {
            return Err(IdentifierError::Empty { kind: KIND });
        }
        if id.chars().count() > RECORD_ID_MAX {
            return Err(IdentifierError::TooLong {
                kind: KIND,
                max: RECORD_ID_MAX,
            });
        }
        if id.chars().any(char::is_control) {
            return Err(IdentifierError::InvalidCharacters {
                kind: KIND,
                value: id.escape_default().to_string(),
            });
        }
        Ok(Self(id.to_owned()))
    }

    /// Fresh identifier for a newly created record.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RecordId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.0
    }
}

/// Fully qualified address of one target record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetRef {
    /// Table holding the record.
    pub table: TargetTable,
    /// Record identifier within the table.
    pub id: RecordId,
}

impl TargetRef {
    /// Pair a table with a record identifier.
    #[must_use]
    pub const fn new(table: TargetTable, id: RecordId) -> Self {
        Self { table, id }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.id)
    }
}

/// Extraction confidence score in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

/// Error returned for scores outside `[0, 1]` or not finite.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("confidence must be a finite number between 0 and 1, got {0}")]
pub struct ConfidenceError(pub f64);

impl Confidence {
    /// Validate a confidence score.
    ///
    /// # Errors
    /// Returns [`ConfidenceError`] when `value` is NaN, infinite or outside
    /// `[0, 1]`.
    pub fn new(value: f64) -> Result<Self, ConfidenceError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfidenceError(value))
        }
    }

    /// Raw score.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ConfidenceError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

/// Pointer to the artefact a proposal was extracted from.
///
/// Opaque to the engine; kept for audit and explainability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    /// Document, meeting or conversation identifier.
    pub artifact: String,
    /// Location inside the artefact, such as a timestamp range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    /// Quoted text supporting the proposal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

/// Who performed an audited step, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditStamp {
    /// Acting user.
    pub by: ActorId,
    /// Clock reading at the time of the step.
    pub at: DateTime<Utc>,
}

impl AuditStamp {
    /// Record `by` acting at `at`.
    #[must_use]
    pub const fn new(by: ActorId, at: DateTime<Utc>) -> Self {
        Self { by, at }
    }
}

/// Everything intake needs to open a new pending proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalDraft {
    /// Record kind.
    pub change_type: ChangeType,
    /// Mutation to perform.
    pub operation: Operation,
    /// Table holding the target.
    pub target_table: TargetTable,
    /// Target record; absent for creates.
    pub target_id: Option<RecordId>,
    /// Complete desired field state for creates and updates.
    pub payload: FieldMap,
    /// Prior field state for updates and deletes.
    pub old_snapshot: Option<FieldMap>,
    /// Origin of the proposal.
    pub source_reference: Option<SourceReference>,
    /// Extraction confidence.
    pub confidence: Confidence,
}

/// Proposed mutation to one project record, pending or resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeProposal {
    /// Unique identifier.
    pub id: ProposalId,
    /// Record kind.
    pub change_type: ChangeType,
    /// Mutation to perform.
    pub operation: Operation,
    /// Table holding the target.
    pub target_table: TargetTable,
    /// Target record; filled in after a create is applied.
    pub target_id: Option<RecordId>,
    /// Proposed field values.
    pub payload: FieldMap,
    /// Field values captured before the proposal was opened.
    pub old_snapshot: Option<FieldMap>,
    /// Origin of the proposal.
    pub source_reference: Option<SourceReference>,
    /// Extraction confidence.
    pub confidence: Confidence,
    /// Lifecycle position.
    pub status: ProposalStatus,
    /// Optimistic concurrency version, bumped on every transition.
    pub version: u32,
    /// Submission audit.
    pub created: AuditStamp,
    /// Claim for apply.
    pub approved: Option<AuditStamp>,
    /// Successful apply.
    pub applied: Option<AuditStamp>,
    /// Rejection.
    pub rejected: Option<AuditStamp>,
    /// Successful undo.
    pub reverted: Option<AuditStamp>,
    /// Last payload replacement during edit-approve.
    pub edited: Option<AuditStamp>,
    /// Last failure message.
    pub error: Option<String>,
    /// Time of the last transition.
    pub updated_at: DateTime<Utc>,
}

/// Attempted transition that the current status does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a proposal that is {from}")]
pub struct TransitionError {
    /// Verb describing the rejected transition.
    pub action: &'static str,
    /// Status the proposal was in.
    pub from: ProposalStatus,
}

impl ChangeProposal {
    /// Open a pending proposal at version 1.
    #[must_use]
    pub fn new_pending(draft: ProposalDraft, created_by: ActorId, at: DateTime<Utc>) -> Self {
        let ProposalDraft {
            change_type,
            operation,
            target_table,
            target_id,
            payload,
            old_snapshot,
            source_reference,
            confidence,
        } = draft;
        Self {
            id: ProposalId::random(),
            change_type,
            operation,
            target_table,
            target_id,
            payload,
            old_snapshot,
            source_reference,
            confidence,
            status: ProposalStatus::Pending,
            version: 1,
            created: AuditStamp::new(created_by, at),
            approved: None,
            applied: None,
            rejected: None,
            reverted: None,
            edited: None,
            error: None,
            updated_at: at,
        }
    }

    /// Address of the target record, once known.
    #[must_use]
    pub fn target(&self) -> Option<TargetRef> {
        self.target_id
            .clone()
            .map(|id| TargetRef::new(self.target_table.clone(), id))
    }

    /// Claim the proposal for apply, optionally replacing its payload.
    ///
    /// # Errors
    /// Fails unless the proposal is pending or failed.
    pub fn claim(
        &self,
        by: ActorId,
        at: DateTime<Utc>,
        replacement: Option<FieldMap>,
    ) -> Result<Self, TransitionError> {
        let action = if replacement.is_some() {
            "edit and approve"
        } else {
            "approve"
        };
        self.require(
            &[ProposalStatus::Pending, ProposalStatus::Failed],
            action,
        )?;
        let stamp = AuditStamp::new(by, at);
        let mut next = self.advance(ProposalStatus::Approved, at);
        next.approved = Some(stamp);
        next.error = None;
        if let Some(payload) = replacement {
            next.payload = payload;
            next.edited = Some(stamp);
        }
        Ok(next)
    }

    /// Record a successful apply; `created` carries the id of a new record.
    ///
    /// # Errors
    /// Fails unless the proposal is approved.
    pub fn mark_applied(
        &self,
        by: ActorId,
        at: DateTime<Utc>,
        created: Option<RecordId>,
    ) -> Result<Self, TransitionError> {
        self.require(&[ProposalStatus::Approved], "mark applied")?;
        let mut next = self.advance(ProposalStatus::Applied, at);
        next.applied = Some(AuditStamp::new(by, at));
        if let Some(id) = created {
            next.target_id = Some(id);
        }
        Ok(next)
    }

    /// Record a failed apply.
    ///
    /// # Errors
    /// Fails unless the proposal is approved.
    pub fn mark_failed(
        &self,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        self.require(&[ProposalStatus::Approved], "mark failed")?;
        let mut next = self.advance(ProposalStatus::Failed, at);
        next.error = Some(message.into());
        Ok(next)
    }

    /// Dismiss the proposal.
    ///
    /// # Errors
    /// Fails unless the proposal is pending or failed.
    pub fn reject(&self, by: ActorId, at: DateTime<Utc>) -> Result<Self, TransitionError> {
        self.require(&[ProposalStatus::Pending, ProposalStatus::Failed], "reject")?;
        let mut next = self.advance(ProposalStatus::Rejected, at);
        next.rejected = Some(AuditStamp::new(by, at));
        Ok(next)
    }

    /// Record a successful undo.
    ///
    /// # Errors
    /// Fails unless the proposal is applied.
    pub fn mark_reverted(&self, by: ActorId, at: DateTime<Utc>) -> Result<Self, TransitionError> {
        self.require(&[ProposalStatus::Applied], "undo")?;
        let mut next = self.advance(ProposalStatus::Reverted, at);
        next.reverted = Some(AuditStamp::new(by, at));
        next.error = None;
        Ok(next)
    }

    /// Keep the proposal applied but record why an undo failed.
    ///
    /// # Errors
    /// Fails unless the proposal is applied.
    pub fn annotate_undo_failure(
        &self,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        self.require(&[ProposalStatus::Applied], "undo")?;
        let mut next = self.advance(ProposalStatus::Applied, at);
        next.error = Some(message.into());
        Ok(next)
    }

    /// Release an approved claim whose outcome was never recorded.
    ///
    /// The proposal moves to failed so it can be approved again or rejected.
    /// The target record may already carry the payload.
    ///
    /// # Errors
    /// Fails unless the proposal is approved and has not moved for at least
    /// `stale_after`.
    pub fn release_stale_claim(
        &self,
        at: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<Self, TransitionError> {
        self.require(&[ProposalStatus::Approved], "release")?;
        let idle = (at - self.updated_at).to_std().ok();
        if !idle.is_some_and(|idle| idle >= stale_after) {
            return Err(TransitionError {
                action: "release a recent claim on",
                from: self.status,
            });
        }
        let mut next = self.advance(ProposalStatus::Failed, at);
        next.error = Some(
            "apply outcome was never recorded; the target may already be changed".to_owned(),
        );
        Ok(next)
    }

    /// Check that an undo is possible from the current status.
    ///
    /// # Errors
    /// Fails unless the proposal is applied.
    pub fn ensure_undoable(&self) -> Result<(), TransitionError> {
        self.require(&[ProposalStatus::Applied], "undo")
    }

    fn require(
        &self,
        allowed: &[ProposalStatus],
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(TransitionError {
                action,
                from: self.status,
            })
        }
    }

    fn advance(&self, status: ProposalStatus, at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.version = self.version.saturating_add(1);
        next.updated_at = at;
        next
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn reviewer() -> ActorId {
        ActorId::from_uuid(Uuid::from_u128(7))
    }

    #[fixture]
    fn pending() -> ChangeProposal {
        let mut payload = FieldMap::new();
        payload.insert("severity".to_owned(), json!("high"));
        ChangeProposal::new_pending(
            ProposalDraft {
                change_type: ChangeType::Risk,
                operation: Operation::Update,
                target_table: TargetTable::new("risks").expect("valid table"),
                target_id: Some(RecordId::new("R1").expect("valid id")),
                payload,
                old_snapshot: Some(FieldMap::new()),
                source_reference: None,
                confidence: Confidence::new(0.9).expect("valid confidence"),
            },
            ActorId::from_uuid(Uuid::from_u128(1)),
            Utc::now(),
        )
    }

    fn in_status(mut proposal: ChangeProposal, status: ProposalStatus) -> ChangeProposal {
        proposal.status = status;
        proposal
    }

    #[rstest]
    #[case(Duration::from_secs(0), 0, true)]
    #[case(Duration::from_secs(300), 301, true)]
    #[case(Duration::from_secs(300), 10, false)]
    fn stale_claims_are_released_to_failed(
        pending: ChangeProposal,
        reviewer: ActorId,
        #[case] stale_after: Duration,
        #[case] idle_secs: i64,
        #[case] released: bool,
    ) {
        let claimed = pending
            .claim(reviewer, Utc::now(), None)
            .expect("pending can be claimed");
        let later = claimed.updated_at + chrono::Duration::seconds(idle_secs);

        let result = claimed.release_stale_claim(later, stale_after);

        assert_eq!(result.is_ok(), released);
        if let Ok(next) = result {
            assert_eq!(next.status, ProposalStatus::Failed);
            assert_eq!(next.version, claimed.version + 1);
            assert!(next.error.is_some());
            assert!(next.claim(reviewer, later, None).is_ok());
        }
    }

    #[rstest]
    fn only_approved_claims_can_be_released(pending: ChangeProposal) {
        let err = pending
            .release_stale_claim(Utc::now(), Duration::ZERO)
            .expect_err("pending has no claim");
        assert_eq!(err.from, ProposalStatus::Pending);
    }

    #[rstest]
    fn new_proposals_start_pending_at_version_one(pending: ChangeProposal) {
        assert_eq!(pending.status, ProposalStatus::Pending);
        assert_eq!(pending.version, 1);
        assert_eq!(pending.updated_at, pending.created.at);
    }

    #[rstest]
    #[case(ProposalStatus::Pending, true)]
    #[case(ProposalStatus::Failed, true)]
    #[case(ProposalStatus::Approved, false)]
    #[case(ProposalStatus::Applied, false)]
    #[case(ProposalStatus::Rejected, false)]
    #[case(ProposalStatus::Reverted, false)]
    fn claim_is_allowed_only_from_pending_or_failed(
        pending: ChangeProposal,
        reviewer: ActorId,
        #[case] status: ProposalStatus,
        #[case] allowed: bool,
    ) {
        let proposal = in_status(pending, status);
        let result = proposal.claim(reviewer, Utc::now(), None);
        assert_eq!(result.is_ok(), allowed);
        if let Ok(next) = result {
            assert_eq!(next.status, ProposalStatus::Approved);
            assert_eq!(next.version, proposal.version + 1);
            assert_eq!(next.approved.map(|s| s.by), Some(reviewer));
        }
    }

    #[rstest]
    #[case(ProposalStatus::Pending, true)]
    #[case(ProposalStatus::Failed, true)]
    #[case(ProposalStatus::Approved, false)]
    #[case(ProposalStatus::Applied, false)]
    #[case(ProposalStatus::Rejected, false)]
    #[case(ProposalStatus::Reverted, false)]
    fn reject_is_allowed_only_from_pending_or_failed(
        pending: ChangeProposal,
        reviewer: ActorId,
        #[case] status: ProposalStatus,
        #[case] allowed: bool,
    ) {
        let proposal = in_status(pending, status);
        assert_eq!(proposal.reject(reviewer, Utc::now()).is_ok(), allowed);
    }

    #[rstest]
    #[case(ProposalStatus::Applied, true)]
    #[case(ProposalStatus::Pending, false)]
    #[case(ProposalStatus::Approved, false)]
    #[case(ProposalStatus::Failed, false)]
    #[case(ProposalStatus::Rejected, false)]
    #[case(ProposalStatus::Reverted, false)]
    fn undo_is_allowed_only_from_applied(
        pending: ChangeProposal,
        reviewer: ActorId,
        #[case] status: ProposalStatus,
        #[case] allowed: bool,
    ) {
        let proposal = in_status(pending, status);
        assert_eq!(proposal.mark_reverted(reviewer, Utc::now()).is_ok(), allowed);
        assert_eq!(proposal.ensure_undoable().is_ok(), allowed);
    }

    #[rstest]
    fn edit_claim_replaces_payload_and_stamps_editor(pending: ChangeProposal, reviewer: ActorId) {
        let mut replacement = FieldMap::new();
        replacement.insert("severity".to_owned(), json!("critical"));
        let next = pending
            .claim(reviewer, Utc::now(), Some(replacement.clone()))
            .expect("claim succeeds");
        assert_eq!(next.payload, replacement);
        assert_eq!(next.edited.map(|s| s.by), Some(reviewer));
        assert_eq!(next.old_snapshot, pending.old_snapshot);
    }

    #[rstest]
    fn apply_outcomes_bump_versions(pending: ChangeProposal, reviewer: ActorId) {
        let claimed = pending.claim(reviewer, Utc::now(), None).expect("claim");
        let applied = claimed
            .mark_applied(reviewer, Utc::now(), None)
            .expect("apply");
        assert_eq!(applied.version, 3);
        assert!(applied.applied.is_some());

        let failed = claimed.mark_failed("boom", Utc::now()).expect("fail");
        assert_eq!(failed.status, ProposalStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let retried = failed.claim(reviewer, Utc::now(), None).expect("retry");
        assert!(retried.error.is_none());
    }

    #[rstest]
    fn create_apply_records_new_target(reviewer: ActorId) {
        let proposal = ChangeProposal::new_pending(
            ProposalDraft {
                change_type: ChangeType::Action,
                operation: Operation::Create,
                target_table: TargetTable::new("actions").expect("valid table"),
                target_id: None,
                payload: FieldMap::new(),
                old_snapshot: None,
                source_reference: None,
                confidence: Confidence::new(1.0).expect("valid confidence"),
            },
            reviewer,
            Utc::now(),
        );
        assert!(proposal.target().is_none());
        let created = RecordId::new("A9").expect("valid id");
        let applied = proposal
            .claim(reviewer, Utc::now(), None)
            .and_then(|claimed| claimed.mark_applied(reviewer, Utc::now(), Some(created.clone())))
            .expect("applied");
        assert_eq!(applied.target().map(|t| t.id), Some(created));
    }

    #[rstest]
    fn undo_failure_keeps_applied_status(pending: ChangeProposal) {
        let applied = in_status(pending, ProposalStatus::Applied);
        let next = applied
            .annotate_undo_failure("record vanished", Utc::now())
            .expect("annotate");
        assert_eq!(next.status, ProposalStatus::Applied);
        assert_eq!(next.version, applied.version + 1);
        assert_eq!(next.error.as_deref(), Some("record vanished"));
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(-0.01)]
    #[case(1.01)]
    #[case(f64::INFINITY)]
    fn confidence_rejects_out_of_range(#[case] value: f64) {
        assert!(Confidence::new(value).is_err());
    }

    #[rstest]
    #[case("", false)]
    #[case("risks", true)]
    #[case("Risks", false)]
    #[case("1risks", false)]
    #[case("project_risks", true)]
    fn table_names_are_validated(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(TargetTable::new(raw).is_ok(), valid);
    }

    #[rstest]
    fn wire_enums_round_trip_through_strings() {
        assert_eq!("risk".parse::<ChangeType>(), Ok(ChangeType::Risk));
        assert_eq!(ProposalStatus::Reverted.to_string(), "reverted");
        assert!("upsert".parse::<Operation>().is_err());
    }
}
