use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteNumber;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// The slice of a lead this service reads and writes: the main-quote pointer
/// and the profit-sharing terms that feed the pricing calculator. The rest of
/// the lead record belongs to the CRM screens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub company: String,
    /// At most one quote per lead is authoritative for display and
    /// reporting. Resolved by quote number (the stable human-facing
    /// identity), not by internal id.
    pub main_quote_number: Option<QuoteNumber>,
    /// Secondary salesperson on a shared lead, if any.
    pub shared_with: Option<String>,
    /// Percentage of the grand total attributed to the secondary
    /// salesperson. Ignored by the calculator when the lead is not shared.
    pub share_percent: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn is_shared(&self) -> bool {
        self.shared_with.is_some()
    }
}
