//! Proposal intake handler for the extraction pipeline.
//!
//! ```text
//! POST /api/v1/proposals
//! ```

use actix_web::http::header;
use actix_web::{HttpResponse, post, web};

use crate::inbound::http::ApiResult;
use crate::inbound::http::actor::ActingUser;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

pub use super::proposals_dto::{SubmitProposalBody, SubmitProposalResponse};
use super::proposals_dto::parse_submission;

/// Open a new pending proposal, capturing the target's current fields.
#[utoipa::path(
    post,
    path = "/api/v1/proposals",
    request_body = SubmitProposalBody,
    responses(
        (status = 201, description = "Proposal opened", body = SubmitProposalResponse,
            headers(("Location" = String, description = "URL of the new proposal"))),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Target record not found", body = ErrorSchema),
        (status = 422, description = "Payload does not fit the target", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["proposals"],
    operation_id = "submitProposal"
)]
#[post("/proposals")]
pub async fn submit_proposal(
    state: web::Data<HttpState>,
    user: ActingUser,
    payload: web::Json<SubmitProposalBody>,
) -> ApiResult<HttpResponse> {
    let request = parse_submission(user.actor(), payload.into_inner())?;
    let proposal = state.intake.submit(request).await?;
    let id = proposal.id.to_string();
    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/api/v1/proposals/{id}")))
        .json(SubmitProposalResponse { id }))
}
