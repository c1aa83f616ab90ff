//! Capture and restore of pre-change record state.
//!
//! Holds no state of its own: captured fields travel with the proposal as its
//! `old_snapshot`, and restores are ordinary gateway writes.

use std::sync::Arc;

use crate::domain::ports::{TargetRecordGateway, TargetRecordGatewayError};
use crate::domain::{FieldMap, TargetRef};

/// Snapshot operations over a record gateway.
pub struct SnapshotStore<G> {
    gateway: Arc<G>,
}

impl<G> Clone for SnapshotStore<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<G> SnapshotStore<G>
where
    G: TargetRecordGateway,
{
    /// Create a store over `gateway`.
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Read the current fields of `target` for later reversal.
    ///
    /// # Errors
    /// Propagates gateway failures, including a missing record.
    pub async fn capture(&self, target: &TargetRef) -> Result<FieldMap, TargetRecordGatewayError> {
        self.gateway.read(target).await
    }

    /// Write `fields` back over an existing record.
    ///
    /// # Errors
    /// Propagates gateway failures, including a record deleted since capture.
    pub async fn restore(
        &self,
        target: &TargetRef,
        fields: &FieldMap,
    ) -> Result<(), TargetRecordGatewayError> {
        self.gateway.update(target, fields).await
    }

    /// Bring a deleted record back under its original identifier.
    ///
    /// # Errors
    /// Propagates gateway failures, including an identifier already in use.
    pub async fn recreate(
        &self,
        target: &TargetRef,
        fields: &FieldMap,
    ) -> Result<(), TargetRecordGatewayError> {
        self.gateway.recreate(target, fields).await
    }
}
