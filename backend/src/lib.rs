//! Change proposal moderation and application engine.
//!
//! Automated extraction proposes creates, updates and deletes against
//! project records; reviewers approve, reject, edit or undo them. The crate
//! follows a ports-and-adapters layout:
//!
//! - [`domain`]: proposal lifecycle, moderation and intake services, ports.
//! - [`inbound`]: Actix Web handlers over the driving ports.
//! - [`outbound`]: PostgreSQL and in-memory adapters for the driven ports.
//! - [`settings`]: `MODERATION_*` configuration.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
