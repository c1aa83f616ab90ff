//! Intake of proposals produced by extraction.
//!
//! Update and delete proposals capture the target's current fields as their
//! snapshot while holding the target lock, so the snapshot can never observe a
//! half-applied write from a concurrent moderation.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::info;

use crate::domain::moderation_service::map_repository_error;
use crate::domain::payload::prepare_payload;
use crate::domain::ports::{
    ProposalIntake, ProposalRepository, SubmitProposalRequest, TargetRecordGateway,
    TargetRecordGatewayError,
};
use crate::domain::{
    ChangeProposal, Error, FieldMap, Operation, ProposalDraft, SnapshotStore, TargetLocks,
    TargetRef, schema_for,
};

/// Intake service implementing [`ProposalIntake`].
pub struct IntakeService<R, G> {
    proposals: Arc<R>,
    snapshots: SnapshotStore<G>,
    locks: TargetLocks,
    clock: Arc<dyn Clock>,
}

impl<R, G> Clone for IntakeService<R, G> {
    fn clone(&self) -> Self {
        Self {
            proposals: Arc::clone(&self.proposals),
            snapshots: self.snapshots.clone(),
            locks: self.locks.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R, G> IntakeService<R, G>
where
    G: TargetRecordGateway,
{
    /// Create a service sharing `locks` with moderation.
    pub fn new(
        proposals: Arc<R>,
        gateway: Arc<G>,
        locks: TargetLocks,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            proposals,
            snapshots: SnapshotStore::new(gateway),
            locks,
            clock,
        }
    }
}

fn map_capture_error(error: TargetRecordGatewayError, target: &TargetRef) -> Error {
    match error {
        TargetRecordGatewayError::NotFound { .. } => {
            Error::not_found(format!("record {target} not found")).with_details(json!({
                "field": "targetId",
                "code": "target_not_found",
            }))
        }
        TargetRecordGatewayError::Timeout { .. } | TargetRecordGatewayError::Connection { .. } => {
            Error::service_unavailable(error.to_string())
        }
        TargetRecordGatewayError::Validation { .. }
        | TargetRecordGatewayError::AlreadyExists { .. }
        | TargetRecordGatewayError::Query { .. } => Error::internal(error.to_string()),
    }
}

fn check_target(request: &SubmitProposalRequest) -> Result<Option<TargetRef>, Error> {
    let schema = schema_for(request.change_type);
    if request.target_table.as_str() != schema.table {
        return Err(Error::unprocessable(format!(
            "{} proposals must target the {} table",
            request.change_type, schema.table
        ))
        .with_details(json!({
            "field": "targetTable",
            "expected": schema.table,
            "code": "table_mismatch",
        })));
    }
    match (request.operation, &request.target_id) {
        (Operation::Create, None) => Ok(None),
        (Operation::Create, Some(_)) => Err(Error::invalid_request(
            "create proposals must not name a target id",
        )
        .with_details(json!({ "field": "targetId", "code": "unexpected_target" }))),
        (Operation::Update | Operation::Delete, Some(id)) => Ok(Some(TargetRef::new(
            request.target_table.clone(),
            id.clone(),
        ))),
        (Operation::Update | Operation::Delete, None) => Err(Error::invalid_request(format!(
            "{} proposals require a target id",
            request.operation
        ))
        .with_details(json!({ "field": "targetId", "code": "missing_field" }))),
    }
}

impl<R, G> IntakeService<R, G>
where
    R: ProposalRepository,
    G: TargetRecordGateway,
{
    async fn persist(
        &self,
        request: SubmitProposalRequest,
        payload: FieldMap,
        old_snapshot: Option<FieldMap>,
    ) -> Result<ChangeProposal, Error> {
        let SubmitProposalRequest {
            actor,
            change_type,
            operation,
            target_table,
            target_id,
            source_reference,
            confidence,
            ..
        } = request;
        let proposal = ChangeProposal::new_pending(
            ProposalDraft {
                change_type,
                operation,
                target_table,
                target_id,
                payload,
                old_snapshot,
                source_reference,
                confidence,
            },
            actor.id(),
            self.clock.utc(),
        );
        self.proposals
            .create(&proposal)
            .await
            .map_err(map_repository_error)?;
        info!(
            proposal_id = %proposal.id,
            change_type = %proposal.change_type,
            operation = %proposal.operation,
            confidence = proposal.confidence.value(),
            actor = %actor.id(),
            "proposal submitted"
        );
        Ok(proposal)
    }
}

#[async_trait]
impl<R, G> ProposalIntake for IntakeService<R, G>
where
    R: ProposalRepository,
    G: TargetRecordGateway,
{
    async fn submit(&self, mut request: SubmitProposalRequest) -> Result<ChangeProposal, Error> {
        request.actor.require_submitter()?;
        let raw = std::mem::take(&mut request.payload);
        let Some(target) = check_target(&request)? else {
            let payload = prepare_payload(request.change_type, request.operation, None, raw)?;
            return self.persist(request, payload, None).await;
        };

        let _guard = self.locks.acquire(&target).await;
        let snapshot = self
            .snapshots
            .capture(&target)
            .await
            .map_err(|err| map_capture_error(err, &target))?;
        let payload = prepare_payload(
            request.change_type,
            request.operation,
            Some(&snapshot),
            raw,
        )?;
        self.persist(request, payload, Some(snapshot)).await
    }
}
