//! OpenAPI stand-ins for the domain error payload.
//!
//! The domain `Error` and `ErrorCode` do not derive `ToSchema`; these mirrors
//! register under their names so every handler can cite `ErrorSchema` as the
//! body of its failure responses.

use utoipa::ToSchema;

/// OpenAPI schema for [`crate::domain::ErrorCode`].
///
/// Stable machine-readable error codes returned in API error responses.
#[derive(ToSchema)]
#[schema(as = crate::domain::ErrorCode)]
pub enum ErrorCodeSchema {
    /// The request is malformed.
    #[schema(rename = "invalid_request")]
    InvalidRequest,
    /// The acting user headers are missing or invalid.
    #[schema(rename = "unauthorized")]
    Unauthorized,
    /// The acting user's role does not permit this action.
    #[schema(rename = "forbidden")]
    Forbidden,
    /// The proposal or target record does not exist.
    #[schema(rename = "not_found")]
    NotFound,
    /// Stale expected version or a transition not allowed from the current
    /// status.
    #[schema(rename = "conflict")]
    Conflict,
    /// The payload does not fit the target record schema.
    #[schema(rename = "unprocessable_entity")]
    UnprocessableEntity,
    /// A backing store is unreachable.
    #[schema(rename = "service_unavailable")]
    ServiceUnavailable,
    /// An unexpected error occurred on the server.
    #[schema(rename = "internal_error")]
    InternalError,
}

/// OpenAPI schema for [`crate::domain::Error`].
///
/// API error response payload with machine-readable code and human-readable
/// message.
#[derive(ToSchema)]
#[schema(as = crate::domain::Error, rename_all = "camelCase")]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ErrorSchema {
    /// Stable machine-readable error code.
    #[schema(example = "conflict")]
    code: ErrorCodeSchema,
    /// Human-readable message returned to clients.
    #[schema(example = "version mismatch")]
    message: String,
    /// Correlation identifier for tracing this error across systems.
    #[schema(example = "01HZY8B2W6X5Y7Z9ABCD1234")]
    trace_id: Option<String>,
    /// Supplementary error details for clients.
    details: Option<serde_json::Value>,
}
