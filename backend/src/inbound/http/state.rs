//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{ModerationCommand, ProposalIntake, ProposalQuery};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Approve, reject, edit-approve, undo and batch approval.
    pub moderation: Arc<dyn ModerationCommand>,
    /// Review queue and single-proposal reads.
    pub proposals: Arc<dyn ProposalQuery>,
    /// New proposals from extraction.
    pub intake: Arc<dyn ProposalIntake>,
}

impl HttpState {
    /// Bundle the driving ports.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use mockable::DefaultClock;
    /// use moderation_backend::domain::{IntakeService, ModerationService, TargetLocks};
    /// use moderation_backend::inbound::http::state::HttpState;
    /// use moderation_backend::outbound::memory::{
    ///     InMemoryProposalRepository, InMemoryRecordGateway,
    /// };
    ///
    /// let proposals = Arc::new(InMemoryProposalRepository::new());
    /// let gateway = Arc::new(InMemoryRecordGateway::new());
    /// let locks = TargetLocks::new();
    /// let clock = Arc::new(DefaultClock);
    /// let moderation = Arc::new(ModerationService::new(
    ///     proposals.clone(),
    ///     gateway.clone(),
    ///     locks.clone(),
    ///     clock.clone(),
    /// ));
    /// let intake = Arc::new(IntakeService::new(proposals, gateway, locks, clock));
    /// let state = HttpState::new(moderation.clone(), moderation, intake);
    /// let _queue = state.proposals.clone();
    /// ```
    pub fn new(
        moderation: Arc<dyn ModerationCommand>,
        proposals: Arc<dyn ProposalQuery>,
        intake: Arc<dyn ProposalIntake>,
    ) -> Self {
        Self {
            moderation,
            proposals,
            intake,
        }
    }
}
