//! PostgreSQL-backed `ProposalRepository` implementation using Diesel ORM.
//!
//! Transitions are a single `UPDATE ... WHERE id = $1 AND version = $2`; when
//! no row changes the adapter re-reads the proposal to tell a stale version
//! apart from a missing row.

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use pagination::PageRequest;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::ports::{
    ProposalFilter, ProposalListing, ProposalRepository, ProposalRepositoryError,
};
use crate::domain::{
    ActorId, AuditStamp, ChangeProposal, Confidence, FieldMap, ProposalId, RecordId,
    SourceReference, TargetTable,
};

use super::diesel_error_mapping::{DieselFailure, classify_diesel_error, pool_error_message};
use super::models::{NewProposalRow, ProposalRow, ProposalTransition};
use super::pool::{DbPool, PoolError};
use super::schema::change_proposals;

/// Diesel-backed implementation of the proposal repository port.
#[derive(Clone)]
pub struct DieselProposalRepository {
    pool: DbPool,
}

impl DieselProposalRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ProposalRepositoryError {
    ProposalRepositoryError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> ProposalRepositoryError {
    match classify_diesel_error(&error) {
        DieselFailure::Connection => {
            ProposalRepositoryError::connection("database connection error")
        }
        DieselFailure::Duplicate => ProposalRepositoryError::query("duplicate key"),
        DieselFailure::Query(message) => ProposalRepositoryError::query(message),
    }
}

fn version_to_db(version: u32) -> Result<i32, ProposalRepositoryError> {
    i32::try_from(version).map_err(|_| {
        ProposalRepositoryError::query(format!("version {version} exceeds the stored range"))
    })
}

fn version_from_db(version: i32) -> Result<u32, ProposalRepositoryError> {
    u32::try_from(version).map_err(|err| corrupt("version", err))
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> ProposalRepositoryError {
    ProposalRepositoryError::query(format!("invalid {column} in stored proposal: {detail}"))
}

fn decode_fields(column: &str, value: Value) -> Result<FieldMap, ProposalRepositoryError> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(corrupt(column, format!("expected object, found {other}"))),
    }
}

fn stamp(by: Option<Uuid>, at: Option<chrono::DateTime<chrono::Utc>>) -> Option<AuditStamp> {
    by.zip(at)
        .map(|(by, at)| AuditStamp::new(ActorId::from_uuid(by), at))
}

fn split(stamp: Option<AuditStamp>) -> (Option<Uuid>, Option<chrono::DateTime<chrono::Utc>>) {
    stamp.map_or((None, None), |s| (Some(*s.by.as_uuid()), Some(s.at)))
}

fn row_to_proposal(row: ProposalRow) -> Result<ChangeProposal, ProposalRepositoryError> {
    let ProposalRow {
        id,
        change_type,
        operation,
        target_table,
        target_id,
        payload,
        old_snapshot,
        source_reference,
        confidence,
        status,
        version,
        created_by,
        created_at,
        approved_by,
        approved_at,
        applied_by,
        applied_at,
        rejected_by,
        rejected_at,
        reverted_by,
        reverted_at,
        edited_by,
        edited_at,
        error,
        updated_at,
    } = row;

    Ok(ChangeProposal {
        id: ProposalId::from_uuid(id),
        change_type: change_type
            .parse()
            .map_err(|err| corrupt("change_type", err))?,
        operation: operation.parse().map_err(|err| corrupt("operation", err))?,
        target_table: TargetTable::new(target_table).map_err(|err| corrupt("target_table", err))?,
        target_id: target_id
            .map(RecordId::new)
            .transpose()
            .map_err(|err| corrupt("target_id", err))?,
        payload: decode_fields("payload", payload)?,
        old_snapshot: old_snapshot
            .map(|value| decode_fields("old_snapshot", value))
            .transpose()?,
        source_reference: source_reference
            .map(serde_json::from_value::<SourceReference>)
            .transpose()
            .map_err(|err| corrupt("source_reference", err))?,
        confidence: Confidence::new(confidence).map_err(|err| corrupt("confidence", err))?,
        status: status.parse().map_err(|err| corrupt("status", err))?,
        version: version_from_db(version)?,
        created: AuditStamp::new(ActorId::from_uuid(created_by), created_at),
        approved: stamp(approved_by, approved_at),
        applied: stamp(applied_by, applied_at),
        rejected: stamp(rejected_by, rejected_at),
        reverted: stamp(reverted_by, reverted_at),
        edited: stamp(edited_by, edited_at),
        error,
        updated_at,
    })
}

fn encode_source(
    source: Option<&SourceReference>,
) -> Result<Option<Value>, ProposalRepositoryError> {
    source
        .map(serde_json::to_value)
        .transpose()
        .map_err(|err| ProposalRepositoryError::query(format!("serialise source reference: {err}")))
}

fn transition_for(
    next: &ChangeProposal,
) -> Result<ProposalTransition<'_>, ProposalRepositoryError> {
    let (approved_by, approved_at) = split(next.approved);
    let (applied_by, applied_at) = split(next.applied);
    let (rejected_by, rejected_at) = split(next.rejected);
    let (reverted_by, reverted_at) = split(next.reverted);
    let (edited_by, edited_at) = split(next.edited);
    Ok(ProposalTransition {
        target_id: next.target_id.as_ref().map(RecordId::as_str),
        payload: Value::Object(next.payload.clone()),
        status: next.status.as_str(),
        version: version_to_db(next.version)?,
        approved_by,
        approved_at,
        applied_by,
        applied_at,
        rejected_by,
        rejected_at,
        reverted_by,
        reverted_at,
        edited_by,
        edited_at,
        error: next.error.as_deref(),
        updated_at: next.updated_at,
    })
}

fn filtered(filter: &ProposalFilter) -> change_proposals::BoxedQuery<'static, Pg> {
    let mut query = change_proposals::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(change_proposals::status.eq(status.as_str()));
    }
    if let Some(change_type) = filter.change_type {
        query = query.filter(change_proposals::change_type.eq(change_type.as_str()));
    }
    if let Some(min) = filter.min_confidence {
        query = query.filter(change_proposals::confidence.ge(min.value()));
    }
    if let Some(ids) = &filter.ids {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        query = query.filter(change_proposals::id.eq_any(uuids));
    }
    query
}

async fn explain_swap_failure(
    conn: &mut diesel_async::AsyncPgConnection,
    id: ProposalId,
    expected: u32,
) -> ProposalRepositoryError {
    let current = change_proposals::table
        .filter(change_proposals::id.eq(id.as_uuid()))
        .select(change_proposals::version)
        .first::<i32>(conn)
        .await
        .optional()
        .map_err(map_diesel_error);

    match current {
        Ok(Some(actual)) => match version_from_db(actual) {
            Ok(actual) => ProposalRepositoryError::version_mismatch(expected, actual),
            Err(err) => err,
        },
        Ok(None) => ProposalRepositoryError::not_found(id),
        Err(err) => err,
    }
}

#[async_trait]
impl ProposalRepository for DieselProposalRepository {
    async fn create(&self, proposal: &ChangeProposal) -> Result<(), ProposalRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewProposalRow {
            id: *proposal.id.as_uuid(),
            change_type: proposal.change_type.as_str(),
            operation: proposal.operation.as_str(),
            target_table: proposal.target_table.as_str(),
            target_id: proposal.target_id.as_ref().map(RecordId::as_str),
            payload: Value::Object(proposal.payload.clone()),
            old_snapshot: proposal.old_snapshot.clone().map(Value::Object),
            source_reference: encode_source(proposal.source_reference.as_ref())?,
            confidence: proposal.confidence.value(),
            status: proposal.status.as_str(),
            version: version_to_db(proposal.version)?,
            created_by: *proposal.created.by.as_uuid(),
            created_at: proposal.created.at,
            updated_at: proposal.updated_at,
        };

        diesel::insert_into(change_proposals::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| match classify_diesel_error(&err) {
                DieselFailure::Duplicate => ProposalRepositoryError::duplicate(proposal.id),
                _ => map_diesel_error(err),
            })
    }

    async fn find_by_id(
        &self,
        id: &ProposalId,
    ) -> Result<Option<ChangeProposal>, ProposalRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = change_proposals::table
            .filter(change_proposals::id.eq(id.as_uuid()))
            .select(ProposalRow::as_select())
            .first::<ProposalRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_proposal).transpose()
    }

    async fn list(
        &self,
        filter: &ProposalFilter,
        page: &PageRequest,
    ) -> Result<ProposalListing, ProposalRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

        let total: i64 = filtered(filter)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<ProposalRow> = filtered(filter)
            .order((
                change_proposals::created_at.desc(),
                change_proposals::id.desc(),
            ))
            .limit(i64::from(page.limit()))
            .offset(offset)
            .select(ProposalRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let items = rows
            .into_iter()
            .map(row_to_proposal)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProposalListing {
            items,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn compare_and_swap(
        &self,
        next: &ChangeProposal,
        expected_version: u32,
    ) -> Result<(), ProposalRepositoryError> {
        let expected = version_to_db(expected_version)?;
        let transition = transition_for(next)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let updated = diesel::update(
            change_proposals::table
                .filter(change_proposals::id.eq(next.id.as_uuid()))
                .filter(change_proposals::version.eq(expected)),
        )
        .set(&transition)
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        if updated == 0 {
            return Err(explain_swap_failure(&mut conn, next.id, expected_version).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{ChangeType, Operation, ProposalDraft, ProposalStatus};
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;

    fn proposal() -> ChangeProposal {
        let mut snapshot = FieldMap::new();
        snapshot.insert("title".to_owned(), json!("Vendor slip"));
        ChangeProposal::new_pending(
            ProposalDraft {
                change_type: ChangeType::Risk,
                operation: Operation::Update,
                target_table: TargetTable::new("risks").expect("valid table"),
                target_id: Some(RecordId::new("R1").expect("valid id")),
                payload: snapshot.clone(),
                old_snapshot: Some(snapshot),
                source_reference: Some(SourceReference {
                    artifact: "meeting-42".to_owned(),
                    span: None,
                    quote: Some("the vendor will slip".to_owned()),
                }),
                confidence: Confidence::new(0.9).expect("valid confidence"),
            },
            ActorId::from_uuid(Uuid::from_u128(1)),
            Utc::now(),
        )
    }

    fn row_for(proposal: &ChangeProposal) -> ProposalRow {
        let transition = transition_for(proposal).expect("version fits");
        ProposalRow {
            id: *proposal.id.as_uuid(),
            change_type: proposal.change_type.as_str().to_owned(),
            operation: proposal.operation.as_str().to_owned(),
            target_table: proposal.target_table.as_str().to_owned(),
            target_id: transition.target_id.map(str::to_owned),
            payload: transition.payload,
            old_snapshot: proposal.old_snapshot.clone().map(Value::Object),
            source_reference: encode_source(proposal.source_reference.as_ref())
                .expect("serialisable"),
            confidence: proposal.confidence.value(),
            status: transition.status.to_owned(),
            version: transition.version,
            created_by: *proposal.created.by.as_uuid(),
            created_at: proposal.created.at,
            approved_by: transition.approved_by,
            approved_at: transition.approved_at,
            applied_by: transition.applied_by,
            applied_at: transition.applied_at,
            rejected_by: transition.rejected_by,
            rejected_at: transition.rejected_at,
            reverted_by: transition.reverted_by,
            reverted_at: transition.reverted_at,
            edited_by: transition.edited_by,
            edited_at: transition.edited_at,
            error: transition.error.map(str::to_owned),
            updated_at: proposal.updated_at,
        }
    }

    #[rstest]
    fn rows_decode_to_the_stored_proposal() {
        let original = proposal()
            .reject(ActorId::from_uuid(Uuid::from_u128(2)), Utc::now())
            .expect("pending can be rejected");
        let decoded = row_to_proposal(row_for(&original)).expect("decodes");
        assert_eq!(decoded, original);
        assert_eq!(decoded.status, ProposalStatus::Rejected);
    }

    #[rstest]
    #[case("status", "archived")]
    #[case("change_type", "budget")]
    fn unknown_enum_values_are_reported(#[case] column: &str, #[case] value: &str) {
        let mut row = row_for(&proposal());
        match column {
            "status" => row.status = value.to_owned(),
            _ => row.change_type = value.to_owned(),
        }
        let err = row_to_proposal(row).expect_err("corrupt row");
        assert!(err.to_string().contains(column));
    }

    #[rstest]
    fn non_object_payload_is_reported() {
        let mut row = row_for(&proposal());
        row.payload = json!([1, 2, 3]);
        assert!(row_to_proposal(row).is_err());
    }

    #[rstest]
    #[case(0, true)]
    #[case(2_147_483_647, true)]
    #[case(2_147_483_648, false)]
    #[case(u32::MAX, false)]
    fn versions_outside_the_stored_range_are_refused(
        #[case] version: u32,
        #[case] fits: bool,
    ) {
        let converted = version_to_db(version);
        assert_eq!(converted.is_ok(), fits);
        if let Err(err) = converted {
            assert!(matches!(err, ProposalRepositoryError::Query { .. }));
            assert!(err.to_string().contains(&version.to_string()));
        }
    }

    #[rstest]
    fn oversized_version_fails_the_transition_instead_of_wrapping() {
        let mut next = proposal();
        next.version = u32::MAX;
        assert!(transition_for(&next).is_err());
    }

    #[rstest]
    fn negative_stored_versions_are_reported() {
        let mut row = row_for(&proposal());
        row.version = -1;
        let err = row_to_proposal(row).expect_err("corrupt row");
        assert!(err.to_string().contains("version"));
    }
}
