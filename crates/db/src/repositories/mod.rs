use async_trait::async_trait;
use thiserror::Error;

use dealdesk_core::domain::lead::{Lead, LeadId};
use dealdesk_core::domain::quote::{Quote, QuoteId, QuoteNumber, QuoteStatus};

pub mod lead;
pub mod memory;
pub mod quote;

pub use lead::SqlLeadRepository;
pub use memory::{InMemoryLeadRepository, InMemoryQuoteRepository};
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
}

impl RepositoryError {
    /// True when a write lost to a UNIQUE constraint, e.g. two creates racing
    /// for the same quote number. Callers may reallocate and retry.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::UniqueViolation(_) => true,
            Self::Database(sqlx::Error::Database(error)) => error.is_unique_violation(),
            _ => false,
        }
    }
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;

    /// Resolve a quote by its human-facing number, scoped to the owning
    /// lead. Used by main-quote selection.
    async fn find_by_number(
        &self,
        lead_id: &LeadId,
        number: &QuoteNumber,
    ) -> Result<Option<Quote>, RepositoryError>;

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Quote>, RepositoryError>;

    /// Highest quote number starting with `prefix`. Sequences are fixed-width
    /// and zero-padded, so the lexicographic maximum is the latest allocation;
    /// the next number is its sequence plus one.
    async fn max_number_with_prefix(&self, prefix: &str)
        -> Result<Option<String>, RepositoryError>;

    /// Insert or fully replace a quote and its lines.
    async fn save(&self, quote: &Quote) -> Result<(), RepositoryError>;

    /// Compare-and-set write of the lifecycle fields (status, approval flag,
    /// rejection note). Succeeds only if the stored status still equals
    /// `expected`; returns false when a concurrent transition won the race.
    async fn save_transition(
        &self,
        quote: &Quote,
        expected: QuoteStatus,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;

    async fn save(&self, lead: &Lead) -> Result<(), RepositoryError>;

    /// Point the lead at its authoritative quote. Returns false when the
    /// lead row does not exist.
    async fn set_main_quote(
        &self,
        id: &LeadId,
        number: &QuoteNumber,
    ) -> Result<bool, RepositoryError>;
}
