//! End-to-end moderation flows over the in-memory adapters.
//!
//! Each test wires the real intake and moderation services to a shared
//! in-memory proposal store and record gateway, then drives a proposal
//! through its lifecycle and checks both the proposal and the target record.

use std::sync::Arc;
use std::time::Duration;

use mockable::DefaultClock;
use moderation_backend::domain::ports::{
    BatchApproveRequest, BatchSelection, ModerationCommand, ProposalAction, ProposalIntake,
    ProposalQuery, SubmitProposalRequest,
};
use moderation_backend::domain::{
    Actor, ActorId, ActorRole, ChangeType, Confidence, ErrorCode, FieldMap, IntakeService,
    ModerationService, ModerationSettings, Operation, ProposalId, ProposalStatus, RecordId,
    SourceReference, TargetLocks, TargetRef, TargetTable,
};
use moderation_backend::outbound::memory::{InMemoryProposalRepository, InMemoryRecordGateway};
use rstest::rstest;
use serde_json::{Value, json};
use uuid::Uuid;

type Moderation = ModerationService<InMemoryProposalRepository, InMemoryRecordGateway>;
type Intake = IntakeService<InMemoryProposalRepository, InMemoryRecordGateway>;

struct Harness {
    gateway: Arc<InMemoryRecordGateway>,
    moderation: Moderation,
    intake: Intake,
}

impl Harness {
    fn new() -> Self {
        Self::with_gateway(InMemoryRecordGateway::new(), ModerationSettings::default())
    }

    fn with_gateway(gateway: InMemoryRecordGateway, settings: ModerationSettings) -> Self {
        let proposals = Arc::new(InMemoryProposalRepository::new());
        let gateway = Arc::new(gateway);
        let locks = TargetLocks::new();
        let clock = Arc::new(DefaultClock);
        Self {
            moderation: ModerationService::new(
                Arc::clone(&proposals),
                Arc::clone(&gateway),
                locks.clone(),
                clock.clone(),
            )
            .with_settings(settings),
            intake: IntakeService::new(proposals, Arc::clone(&gateway), locks, clock),
            gateway,
        }
    }

    async fn submit(
        &self,
        change_type: ChangeType,
        operation: Operation,
        target_id: Option<&str>,
        payload: Value,
        confidence: f64,
    ) -> ProposalId {
        self.intake
            .submit(submission(
                change_type,
                operation,
                target_id,
                payload,
                confidence,
            ))
            .await
            .expect("submission accepted")
            .id
    }
}

fn fields(value: Value) -> FieldMap {
    value.as_object().cloned().expect("object literal")
}

fn extractor() -> Actor {
    Actor::new(ActorId::from_uuid(Uuid::from_u128(1)), ActorRole::Extractor)
}

fn reviewer() -> Actor {
    Actor::new(ActorId::from_uuid(Uuid::from_u128(2)), ActorRole::Reviewer)
}

fn table_for(change_type: ChangeType) -> TargetTable {
    let name = match change_type {
        ChangeType::Action => "actions",
        ChangeType::Risk => "risks",
        ChangeType::Decision => "decisions",
        ChangeType::Integration => "integrations",
        ChangeType::Workstream => "workstreams",
        ChangeType::Memory => "memories",
    };
    TargetTable::new(name).expect("valid table")
}

fn target(change_type: ChangeType, id: &str) -> TargetRef {
    TargetRef::new(
        table_for(change_type),
        RecordId::new(id).expect("valid record id"),
    )
}

fn submission(
    change_type: ChangeType,
    operation: Operation,
    target_id: Option<&str>,
    payload: Value,
    confidence: f64,
) -> SubmitProposalRequest {
    SubmitProposalRequest {
        actor: extractor(),
        change_type,
        operation,
        target_table: table_for(change_type),
        target_id: target_id.map(|id| RecordId::new(id).expect("valid record id")),
        payload: fields(payload),
        source_reference: Some(SourceReference {
            artifact: "meeting-42".to_owned(),
            span: None,
            quote: None,
        }),
        confidence: Confidence::new(confidence).expect("valid confidence"),
    }
}

fn act(id: ProposalId) -> ProposalAction {
    ProposalAction {
        actor: reviewer(),
        id,
        expected_version: None,
    }
}

fn seed_risk(harness: &Harness) -> TargetRef {
    let risk = target(ChangeType::Risk, "R1");
    harness.gateway.seed(
        risk.clone(),
        fields(json!({ "title": "Vendor slip", "severity": "medium" })),
    );
    risk
}

#[tokio::test]
async fn approve_then_undo_restores_the_original_fields() {
    let harness = Harness::new();
    let risk = seed_risk(&harness);
    let id = harness
        .submit(
            ChangeType::Risk,
            Operation::Update,
            Some("R1"),
            json!({ "severity": "high" }),
            0.92,
        )
        .await;

    let applied = harness.moderation.approve(act(id)).await.expect("approve");
    assert_eq!(applied.status, ProposalStatus::Applied);
    assert_eq!(
        harness.gateway.get(&risk),
        Some(fields(json!({ "title": "Vendor slip", "severity": "high" })))
    );

    let reverted = harness.moderation.undo(act(id)).await.expect("undo");
    assert_eq!(reverted.status, ProposalStatus::Reverted);
    assert_eq!(reverted.error, None);
    assert_eq!(
        harness.gateway.get(&risk),
        Some(fields(json!({ "title": "Vendor slip", "severity": "medium" })))
    );

    let stored = harness.moderation.get(&id).await.expect("stored proposal");
    assert!(stored.approved.is_some());
    assert!(stored.applied.is_some());
    assert_eq!(stored.reverted.map(|stamp| stamp.by), Some(reviewer().id()));
}

#[tokio::test]
async fn threshold_batch_applies_only_confident_proposals() {
    let harness = Harness::new();
    let mut ids = Vec::new();
    for (title, confidence) in [("First", 0.9), ("Second", 0.7), ("Third", 0.95)] {
        ids.push(
            harness
                .submit(
                    ChangeType::Action,
                    Operation::Create,
                    None,
                    json!({ "title": title, "status": "open" }),
                    confidence,
                )
                .await,
        );
    }

    let outcome = harness
        .moderation
        .batch_approve(BatchApproveRequest {
            actor: reviewer(),
            selection: BatchSelection::Threshold {
                min_confidence: Confidence::new(0.85).expect("valid confidence"),
                scope: None,
            },
        })
        .await
        .expect("batch runs");

    let mut succeeded = outcome.succeeded.clone();
    succeeded.sort();
    let mut expected = vec![ids[0], ids[2]];
    expected.sort();
    assert_eq!(succeeded, expected);
    assert!(outcome.failed.is_empty());

    let skipped = harness.moderation.get(&ids[1]).await.expect("stored");
    assert_eq!(skipped.status, ProposalStatus::Pending);
}

#[tokio::test]
async fn explicit_batch_reports_each_item_independently() {
    let harness = Harness::new();
    seed_risk(&harness);
    let good = harness
        .submit(
            ChangeType::Risk,
            Operation::Update,
            Some("R1"),
            json!({ "mitigation": "Second supplier" }),
            0.8,
        )
        .await;
    let rejected = harness
        .submit(
            ChangeType::Action,
            Operation::Create,
            None,
            json!({ "title": "Call vendor", "status": "open" }),
            0.6,
        )
        .await;
    harness
        .moderation
        .reject(act(rejected))
        .await
        .expect("reject");

    let outcome = harness
        .moderation
        .batch_approve(BatchApproveRequest {
            actor: reviewer(),
            selection: BatchSelection::Ids(vec![good, rejected]),
        })
        .await
        .expect("batch runs");

    assert_eq!(outcome.succeeded, vec![good]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].id, rejected);
    assert_eq!(outcome.failed[0].status, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_approvals_apply_exactly_once() {
    let harness = Harness::with_gateway(
        InMemoryRecordGateway::new().with_latency(Duration::from_millis(20)),
        ModerationSettings::default(),
    );
    seed_risk(&harness);
    let id = harness
        .submit(
            ChangeType::Risk,
            Operation::Update,
            Some("R1"),
            json!({ "severity": "critical" }),
            0.9,
        )
        .await;

    let (first, second) = tokio::join!(
        harness.moderation.approve(act(id)),
        harness.moderation.approve(act(id))
    );

    let results = [first, second];
    let applied = results
        .iter()
        .filter(|result| {
            result
                .as_ref()
                .is_ok_and(|outcome| outcome.status == ProposalStatus::Applied)
        })
        .count();
    let conflicts = results
        .iter()
        .filter(|result| {
            result
                .as_ref()
                .is_err_and(|err| err.code() == ErrorCode::Conflict)
        })
        .count();
    assert_eq!((applied, conflicts), (1, 1));

    let stored = harness.moderation.get(&id).await.expect("stored");
    assert_eq!(stored.status, ProposalStatus::Applied);
}

#[tokio::test]
async fn rejecting_twice_is_a_conflict() {
    let harness = Harness::new();
    let id = harness
        .submit(
            ChangeType::Decision,
            Operation::Create,
            None,
            json!({ "title": "Adopt the new CRM" }),
            0.5,
        )
        .await;

    let first = harness.moderation.reject(act(id)).await.expect("reject");
    assert_eq!(first.status, ProposalStatus::Rejected);

    let err = harness
        .moderation
        .reject(act(id))
        .await
        .expect_err("second reject refused");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn stale_version_is_refused() {
    let harness = Harness::new();
    let id = harness
        .submit(
            ChangeType::Workstream,
            Operation::Create,
            None,
            json!({ "name": "Data migration" }),
            0.7,
        )
        .await;

    let err = harness
        .moderation
        .approve(ProposalAction {
            expected_version: Some(7),
            ..act(id)
        })
        .await
        .expect_err("stale version refused");
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(
        err.details().and_then(|details| details.get("actualVersion")),
        Some(&json!(1))
    );
}

#[tokio::test]
async fn failed_proposal_can_be_edited_and_applied() {
    let harness = Harness::new();
    let risk = seed_risk(&harness);
    let id = harness
        .submit(
            ChangeType::Risk,
            Operation::Update,
            Some("R1"),
            json!({ "workstreamId": "W9" }),
            0.9,
        )
        .await;

    let failed = harness.moderation.approve(act(id)).await.expect("approve");
    assert_eq!(failed.status, ProposalStatus::Failed);
    assert!(failed.error.is_some());
    assert_eq!(
        harness.gateway.get(&risk),
        Some(fields(json!({ "title": "Vendor slip", "severity": "medium" })))
    );

    let applied = harness
        .moderation
        .edit_approve(act(id), fields(json!({ "severity": "high" })))
        .await
        .expect("edit-approve");
    assert_eq!(applied.status, ProposalStatus::Applied);
    assert_eq!(applied.error, None);
    assert_eq!(
        harness.gateway.get(&risk),
        Some(fields(json!({ "title": "Vendor slip", "severity": "high" })))
    );

    let stored = harness.moderation.get(&id).await.expect("stored");
    assert!(stored.edited.is_some());
}

#[tokio::test]
async fn undoing_a_create_deletes_the_record() {
    let harness = Harness::new();
    let id = harness
        .submit(
            ChangeType::Integration,
            Operation::Create,
            None,
            json!({ "name": "Payroll feed", "system": "SAP" }),
            0.88,
        )
        .await;

    harness.moderation.approve(act(id)).await.expect("approve");
    let created = harness
        .moderation
        .get(&id)
        .await
        .expect("stored")
        .target()
        .expect("create records its target");
    assert!(harness.gateway.get(&created).is_some());

    let reverted = harness.moderation.undo(act(id)).await.expect("undo");
    assert_eq!(reverted.status, ProposalStatus::Reverted);
    assert_eq!(harness.gateway.get(&created), None);
}

#[tokio::test]
async fn undoing_a_delete_recreates_the_record_under_its_id() {
    let harness = Harness::new();
    let risk = seed_risk(&harness);
    let id = harness
        .submit(ChangeType::Risk, Operation::Delete, Some("R1"), json!({}), 0.75)
        .await;

    harness.moderation.approve(act(id)).await.expect("approve");
    assert_eq!(harness.gateway.get(&risk), None);

    harness.moderation.undo(act(id)).await.expect("undo");
    assert_eq!(
        harness.gateway.get(&risk),
        Some(fields(json!({ "title": "Vendor slip", "severity": "medium" })))
    );
}

#[tokio::test]
async fn undo_requires_an_applied_proposal() {
    let harness = Harness::new();
    let id = harness
        .submit(
            ChangeType::Memory,
            Operation::Create,
            None,
            json!({ "content": "Steering group meets on Thursdays" }),
            0.6,
        )
        .await;

    let err = harness
        .moderation
        .undo(act(id))
        .await
        .expect_err("pending proposals cannot be undone");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn slow_gateway_marks_the_proposal_failed() {
    let harness = Harness::with_gateway(
        InMemoryRecordGateway::new().with_latency(Duration::from_millis(200)),
        ModerationSettings {
            gateway_timeout: Duration::from_millis(20),
            ..ModerationSettings::default()
        },
    );
    let risk = seed_risk(&harness);
    let id = harness
        .submit(
            ChangeType::Risk,
            Operation::Update,
            Some("R1"),
            json!({ "severity": "low" }),
            0.9,
        )
        .await;

    let outcome = harness.moderation.approve(act(id)).await.expect("approve");
    assert_eq!(outcome.status, ProposalStatus::Failed);
    assert!(outcome.error.is_some_and(|message| message.contains("did not respond")));
    assert_eq!(
        harness.gateway.get(&risk),
        Some(fields(json!({ "title": "Vendor slip", "severity": "medium" })))
    );
}

#[rstest]
#[case::update_missing_record(
    submission(ChangeType::Risk, Operation::Update, Some("R404"), json!({ "severity": "high" }), 0.9),
    ErrorCode::NotFound
)]
#[case::unknown_field(
    submission(ChangeType::Action, Operation::Create, None, json!({ "colour": "red" }), 0.9),
    ErrorCode::UnprocessableEntity
)]
#[case::create_with_target(
    submission(ChangeType::Action, Operation::Create, Some("A1"), json!({ "title": "x" }), 0.9),
    ErrorCode::InvalidRequest
)]
#[case::delete_with_payload(
    submission(ChangeType::Risk, Operation::Delete, Some("R1"), json!({ "title": "x" }), 0.9),
    ErrorCode::UnprocessableEntity
)]
#[tokio::test]
async fn intake_refuses_malformed_submissions(
    #[case] request: SubmitProposalRequest,
    #[case] expected: ErrorCode,
) {
    let harness = Harness::new();
    seed_risk(&harness);

    let err = harness
        .intake
        .submit(request)
        .await
        .expect_err("submission refused");
    assert_eq!(err.code(), expected);
}

#[tokio::test]
async fn reviewers_cannot_submit_and_extractors_cannot_approve() {
    let harness = Harness::new();
    let mut request = submission(
        ChangeType::Decision,
        Operation::Create,
        None,
        json!({ "title": "Freeze scope" }),
        0.8,
    );
    request.actor = reviewer();
    let err = harness
        .intake
        .submit(request)
        .await
        .expect_err("reviewers do not submit");
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let id = harness
        .submit(
            ChangeType::Decision,
            Operation::Create,
            None,
            json!({ "title": "Freeze scope" }),
            0.8,
        )
        .await;
    let err = harness
        .moderation
        .approve(ProposalAction {
            actor: extractor(),
            ..act(id)
        })
        .await
        .expect_err("extractors do not approve");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}
