//! Process-local `ProposalRepository` used when no database is configured.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use pagination::PageRequest;

use crate::domain::ports::{
    ProposalFilter, ProposalListing, ProposalRepository, ProposalRepositoryError,
};
use crate::domain::{ChangeProposal, ProposalId};

/// In-memory proposal store with the same version semantics as the Diesel
/// adapter.
#[derive(Debug, Default)]
pub struct InMemoryProposalRepository {
    proposals: RwLock<HashMap<ProposalId, ChangeProposal>>,
}

impl InMemoryProposalRepository {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn window_bounds(page: &PageRequest) -> (usize, usize) {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
    (offset, limit)
}

#[async_trait]
impl ProposalRepository for InMemoryProposalRepository {
    async fn create(&self, proposal: &ChangeProposal) -> Result<(), ProposalRepositoryError> {
        let mut proposals = self
            .proposals
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if proposals.contains_key(&proposal.id) {
            return Err(ProposalRepositoryError::duplicate(proposal.id));
        }
        proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ProposalId,
    ) -> Result<Option<ChangeProposal>, ProposalRepositoryError> {
        Ok(self
            .proposals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    async fn list(
        &self,
        filter: &ProposalFilter,
        page: &PageRequest,
    ) -> Result<ProposalListing, ProposalRepositoryError> {
        let proposals = self.proposals.read().unwrap_or_else(PoisonError::into_inner);
        let mut matching: Vec<&ChangeProposal> =
            proposals.values().filter(|p| filter.matches(p)).collect();
        matching.sort_by(|a, b| {
            b.created
                .at
                .cmp(&a.created.at)
                .then_with(|| b.id.cmp(&a.id))
        });
        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let (offset, limit) = window_bounds(page);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(ProposalListing { items, total })
    }

    async fn compare_and_swap(
        &self,
        next: &ChangeProposal,
        expected_version: u32,
    ) -> Result<(), ProposalRepositoryError> {
        let mut proposals = self
            .proposals
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let stored = proposals
            .get_mut(&next.id)
            .ok_or_else(|| ProposalRepositoryError::not_found(next.id))?;
        if stored.version != expected_version {
            return Err(ProposalRepositoryError::version_mismatch(
                expected_version,
                stored.version,
            ));
        }
        let old_snapshot = stored.old_snapshot.take();
        *stored = ChangeProposal {
            old_snapshot,
            ..next.clone()
        };
        Ok(())
    }
}
