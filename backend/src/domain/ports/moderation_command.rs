//! Driving port for reviewer actions on proposals.

use async_trait::async_trait;

use crate::domain::{
    Actor, ChangeProposal, Confidence, Error, FieldMap, ProposalId, ProposalStatus,
};

/// A reviewer action aimed at one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalAction {
    /// User performing the action.
    pub actor: Actor,
    /// Proposal acted upon.
    pub id: ProposalId,
    /// Version the caller last saw; `None` accepts the stored version.
    pub expected_version: Option<u32>,
}

/// Where a proposal ended up after a reviewer action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationOutcome {
    /// Proposal acted upon.
    pub id: ProposalId,
    /// Status after the action.
    pub status: ProposalStatus,
    /// Version after the action.
    pub version: u32,
    /// Failure message for failed applies and undos.
    pub error: Option<String>,
}

impl From<&ChangeProposal> for ModerationOutcome {
    fn from(value: &ChangeProposal) -> Self {
        Self {
            id: value.id,
            status: value.status,
            version: value.version,
            error: value.error.clone(),
        }
    }
}

/// Which proposals a batch approval covers.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchSelection {
    /// Exactly these proposals, each of which must be pending.
    Ids(Vec<ProposalId>),
    /// Every pending proposal scored at or above `min_confidence`,
    /// optionally restricted to `scope`.
    Threshold {
        /// Lowest confidence included.
        min_confidence: Confidence,
        /// Caller-supplied id set to intersect with.
        scope: Option<Vec<ProposalId>>,
    },
}

/// Batch approval request.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchApproveRequest {
    /// User performing the batch.
    pub actor: Actor,
    /// Proposals covered.
    pub selection: BatchSelection,
}

/// A proposal the batch could not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Proposal that failed.
    pub id: ProposalId,
    /// Why it failed.
    pub error: String,
    /// Status after the attempt; `None` when the proposal was never claimed.
    pub status: Option<ProposalStatus>,
}

/// Per-item results of a batch approval. Never all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Proposals applied.
    pub succeeded: Vec<ProposalId>,
    /// Proposals not applied.
    pub failed: Vec<BatchFailure>,
}

/// Domain use-case port for approving, rejecting and undoing proposals.
///
/// Gateway failures during an apply or undo are recorded on the proposal and
/// reported through [`ModerationOutcome::error`]; only conflicts, validation
/// of the request itself, and store outages surface as [`Error`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModerationCommand: Send + Sync {
    /// Claim a pending or failed proposal and apply its payload.
    async fn approve(&self, action: ProposalAction) -> Result<ModerationOutcome, Error>;

    /// Dismiss a pending or failed proposal.
    async fn reject(&self, action: ProposalAction) -> Result<ModerationOutcome, Error>;

    /// Replace the payload of a pending or failed proposal, then apply it.
    async fn edit_approve(
        &self,
        action: ProposalAction,
        payload: FieldMap,
    ) -> Result<ModerationOutcome, Error>;

    /// Revert an applied proposal using its snapshot.
    async fn undo(&self, action: ProposalAction) -> Result<ModerationOutcome, Error>;

    /// Approve a set of proposals independently.
    async fn batch_approve(&self, request: BatchApproveRequest) -> Result<BatchOutcome, Error>;
}
