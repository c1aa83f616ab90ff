//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Implements the proposal store and the target record gateway on top of
//! `diesel-async` with a shared `bb8` pool.
//!
//! - **Thin adapters**: repositories translate between Diesel rows and domain
//!   types; moderation rules stay in the domain.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Strongly typed errors**: Diesel and pool failures are mapped onto the
//!   port error enums.
//!
//! # Example
//!
//! ```ignore
//! use moderation_backend::outbound::persistence::{DbPool, DieselProposalRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/moderation")).await?;
//! let proposals = DieselProposalRepository::new(pool.clone());
//! ```

mod diesel_error_mapping;
mod diesel_proposal_repository;
mod diesel_record_gateway;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_proposal_repository::DieselProposalRepository;
pub use diesel_record_gateway::DieselRecordGateway;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
