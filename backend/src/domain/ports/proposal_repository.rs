//! Port for durable change proposal storage.
//!
//! The repository is the Proposal Store: it persists [`ChangeProposal`] rows,
//! serves filtered listings, and exposes a single mutation primitive,
//! [`ProposalRepository::compare_and_swap`], on which every moderation
//! transition is built.

use async_trait::async_trait;
use pagination::PageRequest;

use crate::domain::{ChangeProposal, ChangeType, Confidence, ProposalId, ProposalStatus};

use super::define_port_error;

define_port_error! {
    /// Errors raised by proposal repository adapters.
    pub enum ProposalRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "proposal repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "proposal repository query failed: {message}",
        /// A proposal with the same identifier already exists.
        Duplicate { id: ProposalId } =>
            "proposal {id} already exists",
        /// The proposal to swap does not exist.
        NotFound { id: ProposalId } =>
            "proposal {id} not found",
        /// Optimistic concurrency check failed.
        VersionMismatch { expected: u32, actual: u32 } =>
            "version mismatch: expected {expected}, found {actual}",
    }
}

/// Criteria narrowing a proposal listing. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposalFilter {
    /// Only proposals in this status.
    pub status: Option<ProposalStatus>,
    /// Only proposals of this record kind.
    pub change_type: Option<ChangeType>,
    /// Only proposals scored at or above this confidence.
    pub min_confidence: Option<Confidence>,
    /// Only proposals whose identifier is in this set.
    pub ids: Option<Vec<ProposalId>>,
}

impl ProposalFilter {
    /// Whether `proposal` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, proposal: &ChangeProposal) -> bool {
        self.status.is_none_or(|status| proposal.status == status)
            && self
                .change_type
                .is_none_or(|change_type| proposal.change_type == change_type)
            && self
                .min_confidence
                .is_none_or(|min| proposal.confidence >= min)
            && self
                .ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&proposal.id))
    }
}

/// One window of a listing together with the total match count.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalListing {
    /// Proposals in the window, newest first.
    pub items: Vec<ChangeProposal>,
    /// Matches across all windows.
    pub total: u64,
}

/// Port for proposal storage and retrieval.
///
/// # Version Semantics
///
/// - New proposals are stored at the version they carry (1 for intake).
/// - [`Self::compare_and_swap`] writes the mutable columns of `next` only when
///   the stored version equals `expected_version`. The caller sets
///   `next.version` (normally `expected_version + 1`).
/// - `old_snapshot` is written once by [`Self::create`] and never by
///   [`Self::compare_and_swap`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProposalRepository: Send + Sync {
    /// Persist a newly opened proposal.
    async fn create(&self, proposal: &ChangeProposal) -> Result<(), ProposalRepositoryError>;

    /// Fetch a proposal by identifier.
    async fn find_by_id(
        &self,
        id: &ProposalId,
    ) -> Result<Option<ChangeProposal>, ProposalRepositoryError>;

    /// List proposals matching `filter`, newest first.
    async fn list(
        &self,
        filter: &ProposalFilter,
        page: &PageRequest,
    ) -> Result<ProposalListing, ProposalRepositoryError>;

    /// Replace the stored proposal with `next` if its version still equals
    /// `expected_version`.
    ///
    /// Returns [`ProposalRepositoryError::VersionMismatch`] carrying the
    /// stored version when another writer got there first, or
    /// [`ProposalRepositoryError::NotFound`] when no such proposal exists.
    async fn compare_and_swap(
        &self,
        next: &ChangeProposal,
        expected_version: u32,
    ) -> Result<(), ProposalRepositoryError>;
}
