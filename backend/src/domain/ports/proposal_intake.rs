//! Driving port for proposals arriving from the extraction pipeline.

use async_trait::async_trait;

use crate::domain::{
    Actor, ChangeProposal, ChangeType, Confidence, Error, FieldMap, Operation, RecordId,
    SourceReference, TargetTable,
};

/// A proposal as submitted by extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitProposalRequest {
    /// Submitting user, normally the extraction service account.
    pub actor: Actor,
    /// Record kind.
    pub change_type: ChangeType,
    /// Mutation to perform.
    pub operation: Operation,
    /// Table holding the target.
    pub target_table: TargetTable,
    /// Target record; required for update and delete, absent for create.
    pub target_id: Option<RecordId>,
    /// Proposed fields. Updates may be partial.
    pub payload: FieldMap,
    /// Origin of the proposal.
    pub source_reference: Option<SourceReference>,
    /// Extraction confidence.
    pub confidence: Confidence,
}

/// Domain use-case port opening new proposals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProposalIntake: Send + Sync {
    /// Validate, snapshot and persist a new pending proposal.
    async fn submit(&self, request: SubmitProposalRequest) -> Result<ChangeProposal, Error>;
}
