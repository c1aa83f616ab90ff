//! Driving port for reading proposals.

use async_trait::async_trait;
use pagination::{Page, PageRequest};

use crate::domain::{ChangeProposal, Error, ProposalId};

use super::ProposalFilter;

/// Domain use-case port for the review queue and audit history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProposalQuery: Send + Sync {
    /// Fetch one proposal.
    async fn get(&self, id: &ProposalId) -> Result<ChangeProposal, Error>;

    /// List proposals matching `filter`, newest first.
    async fn list(
        &self,
        filter: ProposalFilter,
        page: PageRequest,
    ) -> Result<Page<ChangeProposal>, Error>;
}
