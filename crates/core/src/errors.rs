use thiserror::Error;

use crate::domain::quote::QuoteStatus;

/// Business-rule failures. Every variant is scoped to a single operation on a
/// single quote or lead, surfaced to the immediate caller, and never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid quote transition from {from:?} to {to:?}")]
    InvalidTransition { from: QuoteStatus, to: QuoteStatus },
    #[error("caller `{actor}` is not authorized to {action}")]
    Unauthorized { actor: String, action: String },
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// The four recoverable kinds are business outcomes; everything else is
    /// infrastructure and should be logged and surfaced as a 5xx.
    pub fn is_business_outcome(&self) -> bool {
        matches!(self, Self::Domain(_))
    }
}
