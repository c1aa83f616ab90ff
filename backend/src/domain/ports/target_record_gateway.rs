//! Port for the canonical project record store.
//!
//! The gateway is the only path that mutates target records. Each call runs in
//! its own single-record transaction and validates fields against the record
//! schema of the target table before writing.

use async_trait::async_trait;

use crate::domain::{FieldMap, RecordId, TargetRef, TargetTable};

use super::define_port_error;

define_port_error! {
    /// Errors raised by target record gateway adapters.
    pub enum TargetRecordGatewayError {
        /// Fields do not satisfy the target schema or reference a missing record.
        Validation { message: String } =>
            "record validation failed: {message}",
        /// The record does not exist.
        NotFound { target: String } =>
            "record {target} not found",
        /// A record with the same identifier already exists.
        AlreadyExists { target: String } =>
            "record {target} already exists",
        /// The call exceeded its time bound.
        Timeout { millis: u64 } =>
            "record store did not respond within {millis}ms",
        /// Store connection could not be established.
        Connection { message: String } =>
            "record store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "record store query failed: {message}",
    }
}

/// Port for reading and mutating target records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TargetRecordGateway: Send + Sync {
    /// Read the current fields of a record.
    async fn read(&self, target: &TargetRef) -> Result<FieldMap, TargetRecordGatewayError>;

    /// Insert a record with a freshly generated identifier.
    async fn create(
        &self,
        table: &TargetTable,
        fields: &FieldMap,
    ) -> Result<RecordId, TargetRecordGatewayError>;

    /// Replace every field of an existing record.
    async fn update(
        &self,
        target: &TargetRef,
        fields: &FieldMap,
    ) -> Result<(), TargetRecordGatewayError>;

    /// Remove an existing record.
    async fn delete(&self, target: &TargetRef) -> Result<(), TargetRecordGatewayError>;

    /// Insert a record under a known identifier, as when undoing a delete.
    async fn recreate(
        &self,
        target: &TargetRef,
        fields: &FieldMap,
    ) -> Result<(), TargetRecordGatewayError>;
}
