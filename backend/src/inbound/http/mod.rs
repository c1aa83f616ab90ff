//! HTTP inbound adapter exposing REST endpoints.

pub mod actor;
pub mod error;
pub mod health;
pub mod intake;
pub mod proposals;
mod proposals_dto;
pub mod schemas;
pub mod state;
pub mod validation;

use actix_web::web;

pub use error::ApiResult;

/// JSON extractor configuration reporting malformed bodies in the standard
/// error envelope instead of Actix's plain-text 400.
#[must_use]
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| validation::invalid_json_error(&err).into())
}
