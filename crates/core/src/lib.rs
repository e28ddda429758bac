pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod validation;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::lead::{Lead, LeadId};
pub use domain::principal::{Principal, Role};
pub use domain::quote::{
    initial_state, requires_approval, LineItem, Quote, QuoteId, QuoteNumber, QuoteStatus,
    MARGIN_FLOOR_PCT,
};
pub use errors::{ApplicationError, DomainError};
pub use pricing::{compute_totals, DiscountMode, QuoteTotals};
