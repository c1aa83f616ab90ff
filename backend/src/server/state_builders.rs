//! Builders wiring domain services onto the configured adapters.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};
use tracing::{info, warn};

use moderation_backend::domain::ports::{ProposalRepository, TargetRecordGateway};
use moderation_backend::domain::{IntakeService, ModerationService, TargetLocks};
use moderation_backend::inbound::http::state::HttpState;
use moderation_backend::outbound::memory::{InMemoryProposalRepository, InMemoryRecordGateway};
use moderation_backend::outbound::persistence::{DieselProposalRepository, DieselRecordGateway};

use super::ServerConfig;

/// Share one lock registry and clock between moderation and intake so
/// snapshot capture and apply never interleave on a record.
fn wire_services<R, G>(
    proposals: Arc<R>,
    gateway: Arc<G>,
    config: &ServerConfig,
) -> HttpState
where
    R: ProposalRepository + 'static,
    G: TargetRecordGateway + 'static,
{
    let locks = TargetLocks::new();
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let moderation = Arc::new(
        ModerationService::new(
            Arc::clone(&proposals),
            Arc::clone(&gateway),
            locks.clone(),
            Arc::clone(&clock),
        )
        .with_settings(config.moderation),
    );
    let intake = Arc::new(IntakeService::new(proposals, gateway, locks, clock));
    HttpState::new(moderation.clone(), moderation, intake)
}

/// Build handler state on PostgreSQL when a pool is configured, otherwise
/// on process-local stores.
pub(crate) fn build_http_state(config: &ServerConfig) -> web::Data<HttpState> {
    let state = match &config.db_pool {
        Some(pool) => {
            info!("using PostgreSQL adapters");
            wire_services(
                Arc::new(DieselProposalRepository::new(pool.clone())),
                Arc::new(DieselRecordGateway::new(pool.clone())),
                config,
            )
        }
        None => {
            warn!("no database configured; proposals and records are held in memory");
            wire_services(
                Arc::new(InMemoryProposalRepository::new()),
                Arc::new(InMemoryRecordGateway::new()),
                config,
            )
        }
    };
    web::Data::new(state)
}
