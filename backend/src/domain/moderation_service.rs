//! Moderation engine: approve, reject, edit-approve, undo and batch approval.
//!
//! Every transition is a compare-and-swap on the proposal version, so two
//! reviewers acting on the same proposal cannot both win. Writes to one target
//! record are serialised through [`TargetLocks`]. Once a proposal has been
//! claimed the apply (or undo) runs on a detached task, which guarantees it
//! reaches a recorded outcome even if the caller goes away.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use mockable::Clock;
use pagination::{Page, PageRequest};
use serde_json::json;
use tracing::{error, info, warn};

use crate::domain::payload::prepare_payload;
use crate::domain::ports::{
    BatchApproveRequest, BatchFailure, BatchOutcome, BatchSelection, ModerationCommand,
    ModerationOutcome, ProposalAction, ProposalFilter, ProposalQuery, ProposalRepository,
    ProposalRepositoryError, TargetRecordGateway, TargetRecordGatewayError,
};
use crate::domain::{
    Actor, ChangeProposal, Error, FieldMap, Operation, ProposalId, ProposalStatus, RecordId,
    SnapshotStore, TargetLocks, TargetRef, TraceId, TransitionError,
};

const RECORD_ATTEMPTS: u32 = 3;
const RECORD_BACKOFF: Duration = Duration::from_millis(50);

/// Tunables for the moderation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationSettings {
    /// Upper bound on a single gateway call.
    pub gateway_timeout: Duration,
    /// Most proposals a single batch may cover.
    pub batch_max_size: usize,
    /// Proposals applied concurrently within a batch.
    pub batch_concurrency: usize,
    /// Idle time after which an approved claim with no recorded outcome may
    /// be released back to failed.
    pub stale_claim_after: Duration,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(5),
            batch_max_size: 500,
            batch_concurrency: 4,
            stale_claim_after: Duration::from_secs(300),
        }
    }
}

/// Moderation service implementing the reviewer-facing driving ports.
pub struct ModerationService<R, G> {
    proposals: Arc<R>,
    gateway: Arc<G>,
    snapshots: SnapshotStore<G>,
    locks: TargetLocks,
    clock: Arc<dyn Clock>,
    settings: ModerationSettings,
}

impl<R, G> Clone for ModerationService<R, G> {
    fn clone(&self) -> Self {
        Self {
            proposals: Arc::clone(&self.proposals),
            gateway: Arc::clone(&self.gateway),
            snapshots: self.snapshots.clone(),
            locks: self.locks.clone(),
            clock: Arc::clone(&self.clock),
            settings: self.settings,
        }
    }
}

impl<R, G> ModerationService<R, G>
where
    G: TargetRecordGateway,
{
    /// Create a service with default settings.
    ///
    /// `locks` must be shared with the intake service so snapshot capture and
    /// apply never interleave on one record.
    pub fn new(
        proposals: Arc<R>,
        gateway: Arc<G>,
        locks: TargetLocks,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            snapshots: SnapshotStore::new(Arc::clone(&gateway)),
            proposals,
            gateway,
            locks,
            clock,
            settings: ModerationSettings::default(),
        }
    }

    /// Replace the default settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ModerationSettings) -> Self {
        self.settings = settings;
        self
    }
}

pub(crate) fn map_repository_error(error: ProposalRepositoryError) -> Error {
    match error {
        ProposalRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("proposal store unavailable: {message}"))
        }
        ProposalRepositoryError::Query { message } => {
            Error::internal(format!("proposal store error: {message}"))
        }
        ProposalRepositoryError::Duplicate { id } => {
            Error::conflict(format!("proposal {id} already exists"))
        }
        ProposalRepositoryError::NotFound { id } => {
            Error::not_found(format!("proposal {id} not found"))
        }
        ProposalRepositoryError::VersionMismatch { expected, actual } => {
            version_conflict(expected, actual)
        }
    }
}

fn version_conflict(expected: u32, actual: u32) -> Error {
    Error::conflict("version mismatch").with_details(json!({
        "expectedVersion": expected,
        "actualVersion": actual,
        "code": "version_mismatch",
    }))
}

fn transition_conflict(error: &TransitionError, proposal: &ChangeProposal) -> Error {
    Error::conflict(error.to_string()).with_details(json!({
        "status": proposal.status.as_str(),
        "version": proposal.version,
        "code": "invalid_transition",
    }))
}

fn expected_version(proposal: &ChangeProposal, expected: Option<u32>) -> Result<u32, Error> {
    match expected {
        Some(version) if version != proposal.version => {
            Err(version_conflict(version, proposal.version))
        }
        _ => Ok(proposal.version),
    }
}

fn gateway_timeout_error(timeout: Duration) -> TargetRecordGatewayError {
    TargetRecordGatewayError::timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
}

/// Run `work` to completion on its own task, carrying the caller's trace id.
async fn run_detached<F, T>(work: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>> + Send + 'static,
    T: Send + 'static,
{
    let trace_id = TraceId::current();
    let handle = tokio::spawn(async move {
        match trace_id {
            Some(id) => TraceId::scope(id, work).await,
            None => work.await,
        }
    });
    handle.await.map_err(|join_error| {
        error!(error = %join_error, "detached moderation task did not complete");
        Error::internal("moderation task aborted")
    })?
}

impl<R, G> ModerationService<R, G>
where
    R: ProposalRepository + 'static,
    G: TargetRecordGateway + 'static,
{
    async fn load(&self, id: &ProposalId) -> Result<ChangeProposal, Error> {
        self.proposals
            .find_by_id(id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| Error::not_found(format!("proposal {id} not found")))
    }

    async fn swap(&self, next: &ChangeProposal, expected: u32) -> Result<(), Error> {
        self.proposals
            .compare_and_swap(next, expected)
            .await
            .map_err(map_repository_error)
    }

    /// Move an approved claim that has sat idle past the configured window to
    /// failed, so the caller's transition can proceed from there.
    async fn release_if_stale(&self, current: ChangeProposal) -> Result<ChangeProposal, Error> {
        if current.status != ProposalStatus::Approved {
            return Ok(current);
        }
        let Ok(released) =
            current.release_stale_claim(self.clock.utc(), self.settings.stale_claim_after)
        else {
            return Ok(current);
        };
        self.swap(&released, current.version).await?;
        warn!(
            proposal_id = %current.id,
            claimed_at = %current.updated_at,
            version = released.version,
            "released stale apply claim"
        );
        Ok(released)
    }

    /// Persist the outcome of a detached apply or undo.
    ///
    /// Connection failures are retried briefly because the proposal would
    /// otherwise stay in its in-flight state.
    async fn record(&self, next: &ChangeProposal, expected: u32) -> Result<(), Error> {
        let mut attempt = 1;
        loop {
            match self.proposals.compare_and_swap(next, expected).await {
                Ok(()) => return Ok(()),
                Err(ProposalRepositoryError::Connection { message }) if attempt < RECORD_ATTEMPTS => {
                    warn!(
                        proposal_id = %next.id,
                        attempt,
                        %message,
                        "retrying proposal outcome write"
                    );
                    tokio::time::sleep(RECORD_BACKOFF.saturating_mul(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        proposal_id = %next.id,
                        status = %next.status,
                        error = %err,
                        "failed to record proposal outcome"
                    );
                    return Err(map_repository_error(err));
                }
            }
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, TargetRecordGatewayError>
    where
        F: Future<Output = Result<T, TargetRecordGatewayError>>,
    {
        let timeout = self.settings.gateway_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or_else(|_| Err(gateway_timeout_error(timeout)))
    }

    fn require_target(proposal: &ChangeProposal) -> Result<TargetRef, TargetRecordGatewayError> {
        proposal.target().ok_or_else(|| {
            TargetRecordGatewayError::validation(format!(
                "{} proposal has no target id",
                proposal.operation
            ))
        })
    }

    async fn write_payload(
        &self,
        claimed: &ChangeProposal,
    ) -> Result<Option<RecordId>, TargetRecordGatewayError> {
        match claimed.operation {
            Operation::Create => self
                .gateway
                .create(&claimed.target_table, &claimed.payload)
                .await
                .map(Some),
            Operation::Update => {
                let target = Self::require_target(claimed)?;
                self.gateway
                    .update(&target, &claimed.payload)
                    .await
                    .map(|()| None)
            }
            Operation::Delete => {
                let target = Self::require_target(claimed)?;
                self.gateway.delete(&target).await.map(|()| None)
            }
        }
    }

    async fn apply_claimed(
        self,
        claimed: ChangeProposal,
        actor: Actor,
    ) -> Result<ModerationOutcome, Error> {
        let guard = match claimed.target() {
            Some(target) => Some(self.locks.acquire(&target).await),
            None => None,
        };
        let result = self.bounded(self.write_payload(&claimed)).await;

        let now = self.clock.utc();
        let next = match result {
            Ok(created) => claimed.mark_applied(actor.id(), now, created),
            Err(err) => {
                warn!(
                    proposal_id = %claimed.id,
                    error = %err,
                    "proposal apply failed"
                );
                claimed.mark_failed(err.to_string(), now)
            }
        }
        .map_err(|err| Error::internal(err.to_string()))?;

        let recorded = self.record(&next, claimed.version).await;
        drop(guard);
        if let Err(err) = recorded {
            if let (None, Some(created)) = (&claimed.target_id, &next.target_id) {
                error!(
                    proposal_id = %next.id,
                    target_table = %next.target_table,
                    record_id = %created,
                    "created record is not linked to its proposal"
                );
            }
            return Err(err);
        }
        info!(
            proposal_id = %next.id,
            status = %next.status,
            version = next.version,
            actor = %actor.id(),
            "proposal apply finished"
        );
        Ok(ModerationOutcome::from(&next))
    }

    async fn claim_and_apply(
        &self,
        action: ProposalAction,
        replacement: Option<FieldMap>,
        pending_only: bool,
    ) -> Result<ModerationOutcome, Error> {
        let ProposalAction {
            actor,
            id,
            expected_version: expected,
        } = action;
        actor.require_moderator()?;
        let current = self.load(&id).await?;
        expected_version(&current, expected)?;
        if pending_only && current.status != ProposalStatus::Pending {
            let err = TransitionError {
                action: "batch approve",
                from: current.status,
            };
            return Err(transition_conflict(&err, &current));
        }
        let current = self.release_if_stale(current).await?;
        let expected = current.version;
        let replacement = replacement
            .map(|payload| {
                prepare_payload(
                    current.change_type,
                    current.operation,
                    current.old_snapshot.as_ref(),
                    payload,
                )
            })
            .transpose()?;

        let claimed = current
            .claim(actor.id(), self.clock.utc(), replacement)
            .map_err(|err| transition_conflict(&err, &current))?;
        self.swap(&claimed, expected).await?;
        info!(
            proposal_id = %id,
            version = claimed.version,
            edited = claimed.edited != current.edited,
            actor = %actor.id(),
            "proposal claimed for apply"
        );

        let worker = self.clone();
        run_detached(async move { worker.apply_claimed(claimed, actor).await }).await
    }

    async fn revert_in_gateway(
        &self,
        applied: &ChangeProposal,
        target: &TargetRef,
    ) -> Result<(), TargetRecordGatewayError> {
        match (applied.operation, applied.old_snapshot.as_ref()) {
            (Operation::Create, _) => self.gateway.delete(target).await,
            (Operation::Update, Some(snapshot)) => self.snapshots.restore(target, snapshot).await,
            (Operation::Delete, Some(snapshot)) => self.snapshots.recreate(target, snapshot).await,
            (Operation::Update | Operation::Delete, None) => Err(
                TargetRecordGatewayError::validation("proposal has no snapshot to restore"),
            ),
        }
    }

    async fn undo_applied(
        self,
        observed: ChangeProposal,
        target: TargetRef,
        actor: Actor,
    ) -> Result<ModerationOutcome, Error> {
        let guard = self.locks.acquire(&target).await;
        let fresh = self.load(&observed.id).await?;
        if fresh.version != observed.version {
            return Err(version_conflict(observed.version, fresh.version));
        }
        let result = self.bounded(self.revert_in_gateway(&fresh, &target)).await;

        let now = self.clock.utc();
        let next = match result {
            Ok(()) => fresh.mark_reverted(actor.id(), now),
            Err(err) => {
                warn!(
                    proposal_id = %fresh.id,
                    target = %target,
                    error = %err,
                    "proposal undo failed"
                );
                fresh.annotate_undo_failure(format!("undo failed: {err}"), now)
            }
        }
        .map_err(|err| Error::internal(err.to_string()))?;

        self.record(&next, fresh.version).await?;
        drop(guard);
        info!(
            proposal_id = %next.id,
            status = %next.status,
            version = next.version,
            actor = %actor.id(),
            "proposal undo finished"
        );
        Ok(ModerationOutcome::from(&next))
    }

    async fn collect_candidates(&self, filter: &ProposalFilter) -> Result<Vec<ProposalId>, Error> {
        let limit = self.settings.batch_max_size;
        let mut ids = Vec::new();
        let mut page = PageRequest::widest();
        loop {
            let listing = self
                .proposals
                .list(filter, &page)
                .await
                .map_err(map_repository_error)?;
            let fetched = u64::try_from(listing.items.len()).unwrap_or(u64::MAX);
            ids.extend(listing.items.iter().map(|proposal| proposal.id));
            let exhausted = fetched == 0 || page.offset().saturating_add(fetched) >= listing.total;
            if ids.len() >= limit || exhausted {
                break;
            }
            page = page.next();
        }
        ids.truncate(limit);
        Ok(ids)
    }

    async fn select_batch(&self, selection: BatchSelection) -> Result<Vec<ProposalId>, Error> {
        match selection {
            BatchSelection::Ids(ids) => {
                let mut unique = Vec::with_capacity(ids.len());
                for id in ids {
                    if !unique.contains(&id) {
                        unique.push(id);
                    }
                }
                if unique.len() > self.settings.batch_max_size {
                    return Err(Error::invalid_request(format!(
                        "batch may cover at most {} proposals",
                        self.settings.batch_max_size
                    ))
                    .with_details(json!({
                        "field": "ids",
                        "max": self.settings.batch_max_size,
                        "code": "batch_too_large",
                    })));
                }
                Ok(unique)
            }
            BatchSelection::Threshold {
                min_confidence,
                scope,
            } => {
                let filter = ProposalFilter {
                    status: Some(ProposalStatus::Pending),
                    change_type: None,
                    min_confidence: Some(min_confidence),
                    ids: scope,
                };
                self.collect_candidates(&filter).await
            }
        }
    }
}

fn fold_batch(results: Vec<(ProposalId, Result<ModerationOutcome, Error>)>) -> BatchOutcome {
    results
        .into_iter()
        .fold(BatchOutcome::default(), |mut outcome, (id, result)| {
            match result {
                Ok(done) if done.status == ProposalStatus::Applied => outcome.succeeded.push(id),
                Ok(done) => outcome.failed.push(BatchFailure {
                    id,
                    error: done
                        .error
                        .unwrap_or_else(|| format!("proposal ended {}", done.status)),
                    status: Some(done.status),
                }),
                Err(err) => outcome.failed.push(BatchFailure {
                    id,
                    error: err.message().to_owned(),
                    status: None,
                }),
            }
            outcome
        })
}

#[async_trait]
impl<R, G> ModerationCommand for ModerationService<R, G>
where
    R: ProposalRepository + 'static,
    G: TargetRecordGateway + 'static,
{
    async fn approve(&self, action: ProposalAction) -> Result<ModerationOutcome, Error> {
        self.claim_and_apply(action, None, false).await
    }

    async fn reject(&self, action: ProposalAction) -> Result<ModerationOutcome, Error> {
        let ProposalAction {
            actor,
            id,
            expected_version: expected,
        } = action;
        actor.require_moderator()?;
        let current = self.load(&id).await?;
        expected_version(&current, expected)?;
        let current = self.release_if_stale(current).await?;
        let expected = current.version;
        let next = current
            .reject(actor.id(), self.clock.utc())
            .map_err(|err| transition_conflict(&err, &current))?;
        self.swap(&next, expected).await?;
        info!(
            proposal_id = %id,
            version = next.version,
            actor = %actor.id(),
            "proposal rejected"
        );
        Ok(ModerationOutcome::from(&next))
    }

    async fn edit_approve(
        &self,
        action: ProposalAction,
        payload: FieldMap,
    ) -> Result<ModerationOutcome, Error> {
        self.claim_and_apply(action, Some(payload), false).await
    }

    async fn undo(&self, action: ProposalAction) -> Result<ModerationOutcome, Error> {
        let ProposalAction {
            actor,
            id,
            expected_version: expected,
        } = action;
        actor.require_moderator()?;
        let current = self.load(&id).await?;
        expected_version(&current, expected)?;
        current
            .ensure_undoable()
            .map_err(|err| transition_conflict(&err, &current))?;
        let target = current.target().ok_or_else(|| {
            Error::conflict("applied proposal has no target record to revert").with_details(
                json!({ "code": "missing_target", "status": current.status.as_str() }),
            )
        })?;
        if current.operation != Operation::Create && current.old_snapshot.is_none() {
            return Err(Error::conflict("applied proposal has no snapshot to restore")
                .with_details(json!({ "code": "missing_snapshot" })));
        }

        let worker = self.clone();
        run_detached(async move { worker.undo_applied(current, target, actor).await }).await
    }

    async fn batch_approve(&self, request: BatchApproveRequest) -> Result<BatchOutcome, Error> {
        let BatchApproveRequest { actor, selection } = request;
        actor.require_moderator()?;
        let ids = self.select_batch(selection).await?;
        let requested = ids.len();

        let results: Vec<(ProposalId, Result<ModerationOutcome, Error>)> = stream::iter(ids)
            .map(|id| {
                let action = ProposalAction {
                    actor,
                    id,
                    expected_version: None,
                };
                async move { (id, self.claim_and_apply(action, None, true).await) }
            })
            .buffered(self.settings.batch_concurrency.max(1))
            .collect()
            .await;

        let outcome = fold_batch(results);
        info!(
            requested,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            actor = %actor.id(),
            "batch approval finished"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl<R, G> ProposalQuery for ModerationService<R, G>
where
    R: ProposalRepository + 'static,
    G: TargetRecordGateway + 'static,
{
    async fn get(&self, id: &ProposalId) -> Result<ChangeProposal, Error> {
        self.load(id).await
    }

    async fn list(
        &self,
        filter: ProposalFilter,
        page: PageRequest,
    ) -> Result<Page<ChangeProposal>, Error> {
        let listing = self
            .proposals
            .list(&filter, &page)
            .await
            .map_err(map_repository_error)?;
        Ok(Page::new(listing.items, listing.total, page))
    }
}

#[cfg(test)]
#[path = "moderation_service_tests.rs"]
mod tests;
