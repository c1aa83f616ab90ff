//! PostgreSQL-backed `TargetRecordGateway` over the `project_records` table.
//!
//! Every write runs in its own transaction: schema validation happens before
//! the transaction opens, and referenced records are checked inside it so a
//! concurrent delete cannot slip between the check and the write.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::dsl::{exists, now};
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use serde_json::Value;

use crate::domain::ports::{TargetRecordGateway, TargetRecordGatewayError};
use crate::domain::{FieldMap, RecordId, TargetRef, TargetTable};
use crate::outbound::record_rules::{dangling_reference, validate_record};

use super::diesel_error_mapping::{DieselFailure, classify_diesel_error, pool_error_message};
use super::models::{NewRecordRow, RecordRow};
use super::pool::{DbPool, PoolError};
use super::schema::project_records;

/// Diesel-backed implementation of the target record gateway port.
#[derive(Clone)]
pub struct DieselRecordGateway {
    pool: DbPool,
}

impl DieselRecordGateway {
    /// Create a new gateway with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside a gateway transaction.
#[derive(Debug)]
enum TxError {
    Diesel(diesel::result::Error),
    Gateway(TargetRecordGatewayError),
}

impl From<diesel::result::Error> for TxError {
    fn from(value: diesel::result::Error) -> Self {
        Self::Diesel(value)
    }
}

fn map_pool_error(error: PoolError) -> TargetRecordGatewayError {
    TargetRecordGatewayError::connection(pool_error_message(error))
}

fn map_diesel_error(error: &diesel::result::Error, target: &TargetRef) -> TargetRecordGatewayError {
    match classify_diesel_error(error) {
        DieselFailure::Duplicate => TargetRecordGatewayError::already_exists(target.to_string()),
        DieselFailure::Connection => {
            TargetRecordGatewayError::connection("database connection error")
        }
        DieselFailure::Query(message) => TargetRecordGatewayError::query(message),
    }
}

fn map_tx_error(error: TxError, target: &TargetRef) -> TargetRecordGatewayError {
    match error {
        TxError::Diesel(err) => map_diesel_error(&err, target),
        TxError::Gateway(err) => err,
    }
}

fn record_filter<'a>(
    target: &'a TargetRef,
) -> diesel::dsl::Filter<
    diesel::dsl::Filter<project_records::table, diesel::dsl::Eq<project_records::table_name, &'a str>>,
    diesel::dsl::Eq<project_records::record_id, &'a str>,
> {
    project_records::table
        .filter(project_records::table_name.eq(target.table.as_str()))
        .filter(project_records::record_id.eq(target.id.as_str()))
}

async fn ensure_references(
    conn: &mut AsyncPgConnection,
    references: &[TargetRef],
) -> Result<(), TxError> {
    for reference in references {
        let present: bool = diesel::select(exists(record_filter(reference)))
            .get_result(conn)
            .await?;
        if !present {
            return Err(TxError::Gateway(dangling_reference(reference)));
        }
    }
    Ok(())
}

async fn insert_record(
    conn: &mut AsyncPgConnection,
    target: &TargetRef,
    fields: &FieldMap,
    references: &[TargetRef],
) -> Result<(), TxError> {
    let document = Value::Object(fields.clone());
    conn.transaction(|conn| {
        async move {
            ensure_references(conn, references).await?;
            diesel::insert_into(project_records::table)
                .values(&NewRecordRow {
                    table_name: target.table.as_str(),
                    record_id: target.id.as_str(),
                    fields: &document,
                })
                .execute(conn)
                .await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await
}

#[async_trait]
impl TargetRecordGateway for DieselRecordGateway {
    async fn read(&self, target: &TargetRef) -> Result<FieldMap, TargetRecordGatewayError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = record_filter(target)
            .select(RecordRow::as_select())
            .first::<RecordRow>(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(&err, target))?
            .ok_or_else(|| TargetRecordGatewayError::not_found(target.to_string()))?;

        match row.fields {
            Value::Object(fields) => Ok(fields),
            _ => Err(TargetRecordGatewayError::query(format!(
                "record {target} is not a JSON object"
            ))),
        }
    }

    async fn create(
        &self,
        table: &TargetTable,
        fields: &FieldMap,
    ) -> Result<RecordId, TargetRecordGatewayError> {
        let references = validate_record(table, fields)?;
        let target = TargetRef::new(table.clone(), RecordId::generate());
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        insert_record(&mut conn, &target, fields, &references)
            .await
            .map_err(|err| map_tx_error(err, &target))?;
        Ok(target.id)
    }

    async fn update(
        &self,
        target: &TargetRef,
        fields: &FieldMap,
    ) -> Result<(), TargetRecordGatewayError> {
        let references = validate_record(&target.table, fields)?;
        let document = Value::Object(fields.clone());
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction(|conn| {
            async move {
                ensure_references(conn, &references).await?;
                let updated = diesel::update(record_filter(target))
                    .set((
                        project_records::fields.eq(&document),
                        project_records::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .await?;
                if updated == 0 {
                    return Err(TxError::Gateway(TargetRecordGatewayError::not_found(
                        target.to_string(),
                    )));
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| map_tx_error(err, target))
    }

    async fn delete(&self, target: &TargetRef) -> Result<(), TargetRecordGatewayError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted = diesel::delete(record_filter(target))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(&err, target))?;
        if deleted == 0 {
            return Err(TargetRecordGatewayError::not_found(target.to_string()));
        }
        Ok(())
    }

    async fn recreate(
        &self,
        target: &TargetRef,
        fields: &FieldMap,
    ) -> Result<(), TargetRecordGatewayError> {
        let references = validate_record(&target.table, fields)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        insert_record(&mut conn, target, fields, &references)
            .await
            .map_err(|err| map_tx_error(err, target))
    }
}
