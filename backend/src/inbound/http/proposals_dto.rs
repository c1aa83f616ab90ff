//! Proposal DTOs and parsing helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{
    BatchFailure, BatchOutcome, BatchSelection, ModerationOutcome, ProposalFilter,
    SubmitProposalRequest,
};
use crate::domain::{
    Actor, AuditStamp, ChangeProposal, ChangeType, Error, FieldMap, Operation, ProposalId,
    ProposalStatus, RecordId, SourceReference, TargetTable,
};
use crate::inbound::http::validation::{
    conflicting_fields_error, invalid_value_error, missing_field_error, parse_confidence,
    parse_uuid, parse_uuid_list, parse_wire,
};

#[derive(Debug, Deserialize)]
pub(super) struct ProposalPath {
    pub(super) id: String,
}

pub(super) fn parse_proposal_id(path: &ProposalPath) -> Result<ProposalId, Error> {
    parse_uuid(&path.id, "id").map(ProposalId::from_uuid)
}

/// Review queue filters and window.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListProposalsQuery {
    /// Only proposals in this status.
    #[param(example = "pending")]
    pub status: Option<String>,
    /// Only proposals of this record kind.
    #[param(example = "risk")]
    pub change_type: Option<String>,
    /// Only proposals scored at or above this confidence.
    pub min_confidence: Option<f64>,
    /// Page size, 1 to 100.
    pub limit: Option<u32>,
    /// Items to skip.
    pub offset: Option<u64>,
}

pub(super) fn parse_filter(query: &ListProposalsQuery) -> Result<ProposalFilter, Error> {
    Ok(ProposalFilter {
        status: query
            .status
            .as_deref()
            .map(|raw| parse_wire::<ProposalStatus>(raw, "status"))
            .transpose()?,
        change_type: query
            .change_type
            .as_deref()
            .map(|raw| parse_wire::<ChangeType>(raw, "changeType"))
            .transpose()?,
        min_confidence: query
            .min_confidence
            .map(|value| parse_confidence(value, "minConfidence"))
            .transpose()?,
        ids: None,
    })
}

/// Optimistic concurrency guard carried by reviewer actions.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionRequest {
    /// Version the reviewer last saw.
    pub expected_version: Option<u32>,
}

/// Request payload for editing a proposal before applying it.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditApproveRequest {
    /// Replacement fields for the target record.
    #[schema(value_type = Option<Object>)]
    pub payload: Option<FieldMap>,
    /// Version the reviewer last saw.
    pub expected_version: Option<u32>,
}

pub(super) fn parse_edit_payload(request: EditApproveRequest) -> Result<FieldMap, Error> {
    request
        .payload
        .ok_or_else(|| missing_field_error("payload"))
}

/// Request payload for a batch approval.
///
/// Supply either `ids` or `minConfidence`; `scope` narrows a threshold batch.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchApproveBody {
    /// Proposals to approve; each must be pending.
    #[schema(max_items = 500)]
    pub ids: Option<Vec<String>>,
    /// Approve every pending proposal at or above this confidence.
    pub min_confidence: Option<f64>,
    /// Proposal ids a threshold batch is restricted to.
    #[schema(max_items = 500)]
    pub scope: Option<Vec<String>>,
}

fn to_proposal_ids(values: Vec<String>, field: &str) -> Result<Vec<ProposalId>, Error> {
    Ok(parse_uuid_list(values, field)?
        .into_iter()
        .map(ProposalId::from_uuid)
        .collect())
}

pub(super) fn parse_batch_selection(body: BatchApproveBody) -> Result<BatchSelection, Error> {
    match (body.ids, body.min_confidence) {
        (Some(_), Some(_)) => Err(conflicting_fields_error("ids", "minConfidence")),
        (Some(ids), None) => {
            if body.scope.is_some() {
                return Err(conflicting_fields_error("scope", "ids"));
            }
            Ok(BatchSelection::Ids(to_proposal_ids(ids, "ids")?))
        }
        (None, Some(min)) => Ok(BatchSelection::Threshold {
            min_confidence: parse_confidence(min, "minConfidence")?,
            scope: body
                .scope
                .map(|scope| to_proposal_ids(scope, "scope"))
                .transpose()?,
        }),
        (None, None) => Err(missing_field_error("ids")),
    }
}

/// Origin of a proposal.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceReferenceDto {
    /// Document, meeting or conversation identifier.
    pub artifact: String,
    /// Location inside the artefact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    /// Supporting quote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

impl From<SourceReferenceDto> for SourceReference {
    fn from(value: SourceReferenceDto) -> Self {
        Self {
            artifact: value.artifact,
            span: value.span,
            quote: value.quote,
        }
    }
}

impl From<SourceReference> for SourceReferenceDto {
    fn from(value: SourceReference) -> Self {
        Self {
            artifact: value.artifact,
            span: value.span,
            quote: value.quote,
        }
    }
}

/// Request payload for submitting a new proposal.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProposalBody {
    /// Record kind, such as `risk` or `action`.
    pub change_type: Option<String>,
    /// `create`, `update` or `delete`.
    pub operation: Option<String>,
    /// Table holding the target record.
    pub target_table: Option<String>,
    /// Target record; required for update and delete.
    pub target_id: Option<String>,
    /// Proposed fields.
    #[schema(value_type = Option<Object>)]
    pub payload: Option<FieldMap>,
    /// Origin of the proposal.
    pub source_reference: Option<SourceReferenceDto>,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: Option<f64>,
}

pub(super) fn parse_submission(
    actor: Actor,
    body: SubmitProposalBody,
) -> Result<SubmitProposalRequest, Error> {
    let change_type = body
        .change_type
        .ok_or_else(|| missing_field_error("changeType"))?;
    let operation = body
        .operation
        .ok_or_else(|| missing_field_error("operation"))?;
    let target_table = body
        .target_table
        .ok_or_else(|| missing_field_error("targetTable"))?;
    let confidence = body
        .confidence
        .ok_or_else(|| missing_field_error("confidence"))?;

    Ok(SubmitProposalRequest {
        actor,
        change_type: parse_wire::<ChangeType>(&change_type, "changeType")?,
        operation: parse_wire::<Operation>(&operation, "operation")?,
        target_table: TargetTable::new(target_table.as_str())
            .map_err(|err| invalid_value_error("targetTable", &target_table, err))?,
        target_id: body
            .target_id
            .map(|raw| {
                RecordId::new(raw.as_str()).map_err(|err| invalid_value_error("targetId", &raw, err))
            })
            .transpose()?,
        payload: body.payload.unwrap_or_default(),
        source_reference: body.source_reference.map(SourceReference::from),
        confidence: parse_confidence(confidence, "confidence")?,
    })
}

/// Acknowledgement for a newly opened proposal.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProposalResponse {
    /// Identifier of the new proposal.
    pub id: String,
}

/// Who performed an audited step, and when.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditStampResponse {
    /// Acting user.
    pub by: String,
    /// RFC 3339 timestamp.
    pub at: String,
}

impl From<AuditStamp> for AuditStampResponse {
    fn from(stamp: AuditStamp) -> Self {
        Self {
            by: stamp.by.to_string(),
            at: stamp.at.to_rfc3339(),
        }
    }
}

/// Response payload for one proposal.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProposalResponse {
    pub id: String,
    #[schema(example = "risk")]
    pub change_type: String,
    #[schema(example = "update")]
    pub operation: String,
    pub target_table: String,
    pub target_id: Option<String>,
    #[schema(value_type = Object)]
    pub payload: Value,
    #[schema(value_type = Option<Object>)]
    pub old_snapshot: Option<Value>,
    pub source_reference: Option<SourceReferenceDto>,
    pub confidence: f64,
    #[schema(example = "pending")]
    pub status: String,
    pub version: u32,
    pub created: AuditStampResponse,
    pub approved: Option<AuditStampResponse>,
    pub applied: Option<AuditStampResponse>,
    pub rejected: Option<AuditStampResponse>,
    pub reverted: Option<AuditStampResponse>,
    pub edited: Option<AuditStampResponse>,
    pub error: Option<String>,
    pub updated_at: String,
}

impl From<ChangeProposal> for ProposalResponse {
    fn from(proposal: ChangeProposal) -> Self {
        Self {
            id: proposal.id.to_string(),
            change_type: proposal.change_type.to_string(),
            operation: proposal.operation.to_string(),
            target_table: proposal.target_table.to_string(),
            target_id: proposal.target_id.map(String::from),
            payload: Value::Object(proposal.payload),
            old_snapshot: proposal.old_snapshot.map(Value::Object),
            source_reference: proposal.source_reference.map(SourceReferenceDto::from),
            confidence: proposal.confidence.value(),
            status: proposal.status.to_string(),
            version: proposal.version,
            created: proposal.created.into(),
            approved: proposal.approved.map(AuditStampResponse::from),
            applied: proposal.applied.map(AuditStampResponse::from),
            rejected: proposal.rejected.map(AuditStampResponse::from),
            reverted: proposal.reverted.map(AuditStampResponse::from),
            edited: proposal.edited.map(AuditStampResponse::from),
            error: proposal.error,
            updated_at: proposal.updated_at.to_rfc3339(),
        }
    }
}

/// OpenAPI schema for one window of the review queue.
///
/// Handlers return [`pagination::Page`] directly; this mirrors its shape.
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ProposalPageSchema {
    #[schema(max_items = 100)]
    items: Vec<ProposalResponse>,
    total: u64,
    limit: u32,
    offset: u64,
    /// Link to the following window, absent on the last page.
    next: Option<String>,
}

/// Where a proposal ended up after a reviewer action.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModerationOutcomeResponse {
    pub id: String,
    #[schema(example = "applied")]
    pub status: String,
    pub version: u32,
    /// Gateway failure recorded on the proposal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ModerationOutcome> for ModerationOutcomeResponse {
    fn from(outcome: ModerationOutcome) -> Self {
        Self {
            id: outcome.id.to_string(),
            status: outcome.status.to_string(),
            version: outcome.version,
            error: outcome.error,
        }
    }
}

/// A proposal a batch could not apply.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailureResponse {
    pub id: String,
    pub error: String,
    /// Status after the attempt; absent when the proposal was never claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<BatchFailure> for BatchFailureResponse {
    fn from(failure: BatchFailure) -> Self {
        Self {
            id: failure.id.to_string(),
            error: failure.error,
            status: failure.status.map(|status| status.to_string()),
        }
    }
}

/// Per-item results of a batch approval.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcomeResponse {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailureResponse>,
}

impl From<BatchOutcome> for BatchOutcomeResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            succeeded: outcome.succeeded.iter().map(ToString::to_string).collect(),
            failed: outcome
                .failed
                .into_iter()
                .map(BatchFailureResponse::from)
                .collect(),
        }
    }
}
