//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every HTTP handler and the schema wrappers from
//! [`crate::inbound::http::schemas`], keeping domain types free of utoipa.
//! Swagger UI serves it in debug builds.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::inbound::http::intake::{SubmitProposalBody, SubmitProposalResponse};
use crate::inbound::http::proposals::{
    AuditStampResponse, BatchApproveBody, BatchFailureResponse, BatchOutcomeResponse,
    EditApproveRequest, ModerationOutcomeResponse, ProposalPageSchema, ProposalResponse,
    SourceReferenceDto, VersionRequest,
};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};

/// Register the acting-user headers as security schemes.
struct ActorHeadersAddon;

impl Modify for ActorHeadersAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "ActorId",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "X-Actor-Id",
                "UUID of the acting user, set by the upstream gateway.",
            ))),
        );
        components.add_security_scheme(
            "ActorRole",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "X-Actor-Role",
                "Role of the acting user: reviewer, admin, extractor or viewer.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&ActorHeadersAddon),
    info(
        title = "Moderation backend API",
        description = "Review, apply and undo change proposals against project records."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("ActorId" = [], "ActorRole" = [])),
    paths(
        crate::inbound::http::proposals::list_proposals,
        crate::inbound::http::proposals::get_proposal,
        crate::inbound::http::proposals::approve_proposal,
        crate::inbound::http::proposals::reject_proposal,
        crate::inbound::http::proposals::edit_approve_proposal,
        crate::inbound::http::proposals::undo_proposal,
        crate::inbound::http::proposals::batch_approve,
        crate::inbound::http::intake::submit_proposal,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        ProposalResponse,
        ProposalPageSchema,
        AuditStampResponse,
        SourceReferenceDto,
        VersionRequest,
        EditApproveRequest,
        BatchApproveBody,
        BatchOutcomeResponse,
        BatchFailureResponse,
        ModerationOutcomeResponse,
        SubmitProposalBody,
        SubmitProposalResponse,
    )),
    tags(
        (name = "proposals", description = "Review queue and reviewer actions"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
