//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (repositories, gateways) are implemented by outbound
//! adapters; driving ports (commands, queries) are implemented by domain
//! services and called by inbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod moderation_command;
mod proposal_intake;
mod proposal_query;
mod proposal_repository;
mod target_record_gateway;

#[cfg(test)]
pub use moderation_command::MockModerationCommand;
pub use moderation_command::{
    BatchApproveRequest, BatchFailure, BatchOutcome, BatchSelection, ModerationCommand,
    ModerationOutcome, ProposalAction,
};
#[cfg(test)]
pub use proposal_intake::MockProposalIntake;
pub use proposal_intake::{ProposalIntake, SubmitProposalRequest};
#[cfg(test)]
pub use proposal_query::MockProposalQuery;
pub use proposal_query::ProposalQuery;
#[cfg(test)]
pub use proposal_repository::MockProposalRepository;
pub use proposal_repository::{
    ProposalFilter, ProposalListing, ProposalRepository, ProposalRepositoryError,
};
#[cfg(test)]
pub use target_record_gateway::MockTargetRecordGateway;
pub use target_record_gateway::{TargetRecordGateway, TargetRecordGatewayError};
