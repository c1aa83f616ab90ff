//! Process-local `TargetRecordGateway` used when no database is configured.
//!
//! Applies the same schema and reference checks as the Diesel gateway so
//! proposals behave identically against either store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{TargetRecordGateway, TargetRecordGatewayError};
use crate::domain::{FieldMap, RecordId, TargetRef, TargetTable};
use crate::outbound::record_rules::{dangling_reference, validate_record};

type Records = HashMap<TargetRef, FieldMap>;

/// In-memory record store keyed by `(table, id)`.
#[derive(Debug, Default)]
pub struct InMemoryRecordGateway {
    records: RwLock<Records>,
    latency: Option<Duration>,
}

impl InMemoryRecordGateway {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, for exercising gateway timeouts.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert a record without validation.
    pub fn seed(&self, target: TargetRef, fields: FieldMap) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target, fields);
    }

    /// Current fields of `target`, if present.
    #[must_use]
    pub fn get(&self, target: &TargetRef) -> Option<FieldMap> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .cloned()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn check_references(
    records: &Records,
    table: &TargetTable,
    fields: &FieldMap,
) -> Result<(), TargetRecordGatewayError> {
    validate_record(table, fields)?
        .iter()
        .find(|reference| !records.contains_key(*reference))
        .map_or(Ok(()), |missing| Err(dangling_reference(missing)))
}

#[async_trait]
impl TargetRecordGateway for InMemoryRecordGateway {
    async fn read(&self, target: &TargetRef) -> Result<FieldMap, TargetRecordGatewayError> {
        self.pause().await;
        self.get(target)
            .ok_or_else(|| TargetRecordGatewayError::not_found(target.to_string()))
    }

    async fn create(
        &self,
        table: &TargetTable,
        fields: &FieldMap,
    ) -> Result<RecordId, TargetRecordGatewayError> {
        self.pause().await;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        check_references(&records, table, fields)?;
        let id = RecordId::generate();
        records.insert(TargetRef::new(table.clone(), id.clone()), fields.clone());
        Ok(id)
    }

    async fn update(
        &self,
        target: &TargetRef,
        fields: &FieldMap,
    ) -> Result<(), TargetRecordGatewayError> {
        self.pause().await;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if !records.contains_key(target) {
            return Err(TargetRecordGatewayError::not_found(target.to_string()));
        }
        check_references(&records, &target.table, fields)?;
        records.insert(target.clone(), fields.clone());
        Ok(())
    }

    async fn delete(&self, target: &TargetRef) -> Result<(), TargetRecordGatewayError> {
        self.pause().await;
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(target)
            .map(|_| ())
            .ok_or_else(|| TargetRecordGatewayError::not_found(target.to_string()))
    }

    async fn recreate(
        &self,
        target: &TargetRef,
        fields: &FieldMap,
    ) -> Result<(), TargetRecordGatewayError> {
        self.pause().await;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(target) {
            return Err(TargetRecordGatewayError::already_exists(target.to_string()));
        }
        check_references(&records, &target.table, fields)?;
        records.insert(target.clone(), fields.clone());
        Ok(())
    }
}
