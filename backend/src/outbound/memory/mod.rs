//! In-memory adapters for running without PostgreSQL.
//!
//! The server falls back to these when no database URL is configured, and the
//! integration tests drive the full moderation flow through them.

mod proposal_repository;
mod record_gateway;

pub use proposal_repository::InMemoryProposalRepository;
pub use record_gateway::InMemoryRecordGateway;
