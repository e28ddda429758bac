use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadId;
use crate::domain::principal::Principal;
use crate::errors::DomainError;
use crate::pricing::DiscountMode;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

/// Human-facing quote number (`Q-2026-0007`). Unique, assigned at creation,
/// immutable afterwards. Leads reference their main quote by this value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteNumber(pub String);

/// Minimum line margin, in percent. A quote containing any line below this
/// floor is created in `PendingApproval` and cannot be sent without sign-off.
pub const MARGIN_FLOOR_PCT: Decimal = Decimal::from_parts(8, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteStatus {
    Draft,
    PendingApproval,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    /// Final states admit no outgoing transition, regardless of caller role.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Expired)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub sl_no: u32,
    pub product: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    pub vat_percent: Decimal,
}

impl LineItem {
    pub fn unit_price(&self) -> Decimal {
        self.unit_cost * (Decimal::ONE + self.margin_percent / Decimal::ONE_HUNDRED)
    }

    pub fn total_cost(&self) -> Decimal {
        self.unit_cost * self.quantity
    }

    pub fn total_price(&self) -> Decimal {
        self.unit_price() * self.quantity
    }

    /// VAT is charged on the pre-discount line total; quote-level discount
    /// only reduces the net subtotal. Preserved from the legacy books.
    pub fn line_vat(&self) -> Decimal {
        self.total_price() * self.vat_percent / Decimal::ONE_HUNDRED
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub quote_number: QuoteNumber,
    pub lead_id: LeadId,
    pub status: QuoteStatus,
    pub is_approved: bool,
    pub reject_note: Option<String>,
    pub discount_mode: DiscountMode,
    pub discount_value: Decimal,
    pub share_percent: Decimal,
    pub currency: String,
    pub customer_name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation-time policy gate: any line priced below the margin floor parks
/// the quote in `PendingApproval` until a privileged caller signs off.
pub fn requires_approval(items: &[LineItem]) -> bool {
    items.iter().any(|item| item.margin_percent < MARGIN_FLOOR_PCT)
}

/// Status and approval flag a freshly created (or cloned) quote starts with.
/// Clones re-run this from their own items; nothing is inherited.
pub fn initial_state(items: &[LineItem]) -> (QuoteStatus, bool) {
    if requires_approval(items) {
        (QuoteStatus::PendingApproval, false)
    } else {
        (QuoteStatus::Draft, true)
    }
}

impl Quote {
    /// Sign off a quote that tripped the margin floor. Privileged callers
    /// only; the quote returns to `Draft` with a clean rejection slate.
    pub fn approve(&mut self, caller: &Principal) -> Result<(), DomainError> {
        if !caller.is_privileged() {
            return Err(DomainError::Unauthorized {
                actor: caller.user_id.clone(),
                action: "approve quote".to_string(),
            });
        }
        if self.status != QuoteStatus::PendingApproval {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: QuoteStatus::Draft,
            });
        }

        self.status = QuoteStatus::Draft;
        self.is_approved = true;
        self.reject_note = None;
        Ok(())
    }

    /// Turn down a pending quote with a mandatory note for the requester.
    pub fn reject(&mut self, caller: &Principal, note: &str) -> Result<(), DomainError> {
        if !caller.is_privileged() {
            return Err(DomainError::Unauthorized {
                actor: caller.user_id.clone(),
                action: "reject quote".to_string(),
            });
        }
        if note.trim().is_empty() {
            return Err(DomainError::Validation("rejection note must not be empty".to_string()));
        }
        if self.status != QuoteStatus::PendingApproval {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: QuoteStatus::Rejected,
            });
        }

        self.status = QuoteStatus::Rejected;
        self.is_approved = false;
        self.reject_note = Some(note.trim().to_string());
        Ok(())
    }

    /// Generic status move from the non-final working states. Members may
    /// only shuttle between `Draft` and `Sent`; closing a quote out
    /// (`Accepted`/`Rejected`/`Expired`) is reserved for privileged callers.
    pub fn update_status(
        &mut self,
        caller: &Principal,
        next: QuoteStatus,
    ) -> Result<(), DomainError> {
        if self.status.is_final() || !matches!(self.status, QuoteStatus::Draft | QuoteStatus::Sent)
        {
            return Err(DomainError::InvalidTransition { from: self.status, to: next });
        }
        if next == QuoteStatus::PendingApproval {
            return Err(DomainError::InvalidTransition { from: self.status, to: next });
        }
        if !caller.is_privileged() && !matches!(next, QuoteStatus::Draft | QuoteStatus::Sent) {
            return Err(DomainError::Unauthorized {
                actor: caller.user_id.clone(),
                action: format!("set quote status to {next:?}"),
            });
        }

        self.status = next;
        Ok(())
    }

    /// Download/preview gate: rendered output is only produced for approved
    /// quotes, unless the caller is privileged.
    pub fn can_download(&self, caller: &Principal) -> bool {
        self.is_approved || caller.is_privileged()
    }
}
