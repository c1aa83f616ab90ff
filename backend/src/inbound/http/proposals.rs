//! Review queue and reviewer action handlers.
//!
//! ```text
//! GET  /api/v1/proposals
//! GET  /api/v1/proposals/{id}
//! POST /api/v1/proposals/{id}/approve
//! POST /api/v1/proposals/{id}/reject
//! POST /api/v1/proposals/{id}/edit-approve
//! POST /api/v1/proposals/{id}/undo
//! POST /api/v1/proposals/batch-approve
//! ```

use actix_web::{HttpRequest, get, post, web};
use pagination::{Page, PageRequest};
use serde_json::json;

use crate::domain::Error;
use crate::domain::ports::{BatchApproveRequest, ProposalAction};
use crate::inbound::http::ApiResult;
use crate::inbound::http::actor::ActingUser;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::parse_optional_json;

pub use super::proposals_dto::{
    AuditStampResponse, BatchApproveBody, BatchFailureResponse, BatchOutcomeResponse,
    EditApproveRequest, ListProposalsQuery, ModerationOutcomeResponse, ProposalPageSchema,
    ProposalResponse, SourceReferenceDto, VersionRequest,
};
use super::proposals_dto::{
    ProposalPath, parse_batch_selection, parse_edit_payload, parse_filter, parse_proposal_id,
};

fn parse_page(query: &ListProposalsQuery) -> Result<PageRequest, Error> {
    PageRequest::new(query.limit, query.offset).map_err(|err| {
        Error::invalid_request(err.to_string()).with_details(json!({
            "field": "limit",
            "code": "out_of_range",
        }))
    })
}

fn proposal_action(
    user: ActingUser,
    path: &ProposalPath,
    expected_version: Option<u32>,
) -> Result<ProposalAction, Error> {
    Ok(ProposalAction {
        actor: user.actor(),
        id: parse_proposal_id(path)?,
        expected_version,
    })
}

fn versioned_action(
    user: ActingUser,
    path: &ProposalPath,
    body: &web::Bytes,
) -> Result<ProposalAction, Error> {
    let request: VersionRequest = parse_optional_json(body)?;
    proposal_action(user, path, request.expected_version)
}

/// List proposals for the review queue, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/proposals",
    params(ListProposalsQuery),
    responses(
        (status = 200, description = "One window of proposals", body = ProposalPageSchema),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 422, description = "Invalid confidence", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["proposals"],
    operation_id = "listProposals"
)]
#[get("/proposals")]
pub async fn list_proposals(
    state: web::Data<HttpState>,
    _user: ActingUser,
    request: HttpRequest,
    query: web::Query<ListProposalsQuery>,
) -> ApiResult<web::Json<Page<ProposalResponse>>> {
    let filter = parse_filter(&query)?;
    let page = parse_page(&query)?;
    let listing = state.proposals.list(filter, page).await?;
    Ok(web::Json(
        listing
            .map(ProposalResponse::from)
            .with_next_link(&request.full_url()),
    ))
}

/// Fetch one proposal with its audit history.
#[utoipa::path(
    get,
    path = "/api/v1/proposals/{id}",
    params(("id" = String, Path, description = "Proposal identifier")),
    responses(
        (status = 200, description = "Proposal", body = ProposalResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["proposals"],
    operation_id = "getProposal"
)]
#[get("/proposals/{id}")]
pub async fn get_proposal(
    state: web::Data<HttpState>,
    _user: ActingUser,
    path: web::Path<ProposalPath>,
) -> ApiResult<web::Json<ProposalResponse>> {
    let id = parse_proposal_id(&path)?;
    let proposal = state.proposals.get(&id).await?;
    Ok(web::Json(ProposalResponse::from(proposal)))
}

/// Approve a pending or failed proposal and apply it to its target record.
///
/// A gateway failure is reported as `status = failed` with `error` set, not
/// as an error response.
#[utoipa::path(
    post,
    path = "/api/v1/proposals/{id}/approve",
    request_body(
        content = VersionRequest,
        description = "Optional; an empty body accepts the stored version",
        content_type = "application/json"
    ),
    params(("id" = String, Path, description = "Proposal identifier")),
    responses(
        (status = 200, description = "Outcome of the apply", body = ModerationOutcomeResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Conflict", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["proposals"],
    operation_id = "approveProposal"
)]
#[post("/proposals/{id}/approve")]
pub async fn approve_proposal(
    state: web::Data<HttpState>,
    user: ActingUser,
    path: web::Path<ProposalPath>,
    body: web::Bytes,
) -> ApiResult<web::Json<ModerationOutcomeResponse>> {
    let action = versioned_action(user, &path, &body)?;
    let outcome = state.moderation.approve(action).await?;
    Ok(web::Json(outcome.into()))
}

/// Reject a pending or failed proposal.
#[utoipa::path(
    post,
    path = "/api/v1/proposals/{id}/reject",
    request_body(
        content = VersionRequest,
        description = "Optional; an empty body accepts the stored version",
        content_type = "application/json"
    ),
    params(("id" = String, Path, description = "Proposal identifier")),
    responses(
        (status = 200, description = "Rejected", body = ModerationOutcomeResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Conflict", body = ErrorSchema)
    ),
    tags = ["proposals"],
    operation_id = "rejectProposal"
)]
#[post("/proposals/{id}/reject")]
pub async fn reject_proposal(
    state: web::Data<HttpState>,
    user: ActingUser,
    path: web::Path<ProposalPath>,
    body: web::Bytes,
) -> ApiResult<web::Json<ModerationOutcomeResponse>> {
    let action = versioned_action(user, &path, &body)?;
    let outcome = state.moderation.reject(action).await?;
    Ok(web::Json(outcome.into()))
}

/// Replace a proposal's payload and apply the edited version.
#[utoipa::path(
    post,
    path = "/api/v1/proposals/{id}/edit-approve",
    request_body = EditApproveRequest,
    params(("id" = String, Path, description = "Proposal identifier")),
    responses(
        (status = 200, description = "Outcome of the apply", body = ModerationOutcomeResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Conflict", body = ErrorSchema),
        (status = 422, description = "Payload does not fit the target", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["proposals"],
    operation_id = "editApproveProposal"
)]
#[post("/proposals/{id}/edit-approve")]
pub async fn edit_approve_proposal(
    state: web::Data<HttpState>,
    user: ActingUser,
    path: web::Path<ProposalPath>,
    payload: web::Json<EditApproveRequest>,
) -> ApiResult<web::Json<ModerationOutcomeResponse>> {
    let request = payload.into_inner();
    let action = proposal_action(user, &path, request.expected_version)?;
    let fields = parse_edit_payload(request)?;
    let outcome = state.moderation.edit_approve(action, fields).await?;
    Ok(web::Json(outcome.into()))
}

/// Undo an applied proposal by restoring its snapshot.
///
/// A gateway failure leaves the proposal `applied` with `error` set.
#[utoipa::path(
    post,
    path = "/api/v1/proposals/{id}/undo",
    request_body(
        content = VersionRequest,
        description = "Optional; an empty body accepts the stored version",
        content_type = "application/json"
    ),
    params(("id" = String, Path, description = "Proposal identifier")),
    responses(
        (status = 200, description = "Outcome of the undo", body = ModerationOutcomeResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Conflict", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["proposals"],
    operation_id = "undoProposal"
)]
#[post("/proposals/{id}/undo")]
pub async fn undo_proposal(
    state: web::Data<HttpState>,
    user: ActingUser,
    path: web::Path<ProposalPath>,
    body: web::Bytes,
) -> ApiResult<web::Json<ModerationOutcomeResponse>> {
    let action = versioned_action(user, &path, &body)?;
    let outcome = state.moderation.undo(action).await?;
    Ok(web::Json(outcome.into()))
}

/// Approve several proposals independently, by id or by confidence threshold.
#[utoipa::path(
    post,
    path = "/api/v1/proposals/batch-approve",
    request_body = BatchApproveBody,
    responses(
        (status = 200, description = "Per-item outcomes", body = BatchOutcomeResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 422, description = "Invalid confidence", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["proposals"],
    operation_id = "batchApproveProposals"
)]
#[post("/proposals/batch-approve")]
pub async fn batch_approve(
    state: web::Data<HttpState>,
    user: ActingUser,
    payload: web::Json<BatchApproveBody>,
) -> ApiResult<web::Json<BatchOutcomeResponse>> {
    let selection = parse_batch_selection(payload.into_inner())?;
    let outcome = state
        .moderation
        .batch_approve(BatchApproveRequest {
            actor: user.actor(),
            selection,
        })
        .await?;
    Ok(web::Json(outcome.into()))
}

#[cfg(test)]
#[path = "proposals_tests.rs"]
mod tests;
