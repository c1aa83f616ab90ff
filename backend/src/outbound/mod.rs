//! Outbound adapters implementing the driven domain ports.
//!
//! - **persistence**: PostgreSQL via Diesel, used when a database URL is set.
//! - **memory**: process-local stores for development and tests.
//!
//! Adapters translate between domain types and storage representations and
//! carry no moderation logic of their own.

pub mod memory;
pub mod persistence;
mod record_rules;
