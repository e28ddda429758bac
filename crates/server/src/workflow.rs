//! Quote workflow service: the composition root that binds the domain rules
//! to the repositories and the audit sink. Every mutation loads the current
//! row, applies the pure domain rule, then commits with a compare-and-set on
//! the previous status so racing callers cannot both win.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use dealdesk_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use dealdesk_core::domain::lead::{Lead, LeadId};
use dealdesk_core::domain::principal::Principal;
use dealdesk_core::domain::quote::{
    initial_state, LineItem, Quote, QuoteId, QuoteNumber, QuoteStatus,
};
use dealdesk_core::errors::{ApplicationError, DomainError};
use dealdesk_core::pricing::{compute_totals, DiscountMode, QuoteTotals};
use dealdesk_core::validation::{resequence, validate_discount, validate_items};

use dealdesk_db::{LeadRepository, QuoteRepository, RepositoryError};

/// Caller-supplied line, before ordinals are assigned.
#[derive(Clone, Debug)]
pub struct LineItemInput {
    pub product: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub margin_percent: Decimal,
    pub vat_percent: Decimal,
}

#[derive(Clone, Debug)]
pub struct NewQuoteInput {
    pub lead_id: LeadId,
    pub currency: String,
    pub customer_name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub discount_mode: DiscountMode,
    pub discount_value: Decimal,
    pub items: Vec<LineItemInput>,
}

pub struct QuoteWorkflow {
    quotes: Arc<dyn QuoteRepository>,
    leads: Arc<dyn LeadRepository>,
    audit: Arc<dyn AuditSink>,
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn status_label(status: QuoteStatus) -> &'static str {
    match status {
        QuoteStatus::Draft => "Draft",
        QuoteStatus::PendingApproval => "PendingApproval",
        QuoteStatus::Sent => "Sent",
        QuoteStatus::Accepted => "Accepted",
        QuoteStatus::Rejected => "Rejected",
        QuoteStatus::Expired => "Expired",
    }
}

impl QuoteWorkflow {
    pub fn new(
        quotes: Arc<dyn QuoteRepository>,
        leads: Arc<dyn LeadRepository>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { quotes, leads, audit }
    }

    async fn require_quote(&self, id: &QuoteId) -> Result<Quote, ApplicationError> {
        self.quotes
            .find_by_id(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::not_found("quote", id.0.clone()).into())
    }

    async fn require_lead(&self, id: &LeadId) -> Result<Lead, ApplicationError> {
        self.leads
            .find_by_id(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::not_found("lead", id.0.clone()).into())
    }

    /// Allocate the next `Q-<year>-<seq>` number: one past the highest
    /// sequence already stored under the current year's prefix.
    async fn next_quote_number(&self) -> Result<QuoteNumber, ApplicationError> {
        let prefix = format!("Q-{}-", Utc::now().year());
        let last = self.quotes.max_number_with_prefix(&prefix).await.map_err(persistence)?;
        let next_seq = match last {
            Some(number) => {
                let seq = number
                    .strip_prefix(&prefix)
                    .and_then(|suffix| suffix.parse::<u32>().ok())
                    .ok_or_else(|| {
                        ApplicationError::Persistence(format!("malformed quote number `{number}`"))
                    })?;
                seq + 1
            }
            None => 1,
        };
        Ok(QuoteNumber(format!("{prefix}{next_seq:04}")))
    }

    /// First insert of a quote. The number was allocated from a read that
    /// nothing serializes against the insert, so a concurrent create can win
    /// the same number; the UNIQUE constraint reports that, and we reallocate
    /// from the fresh maximum instead of surfacing a storage error.
    async fn persist_new_quote(&self, mut quote: Quote) -> Result<Quote, ApplicationError> {
        let mut reallocations = 0;
        loop {
            match self.quotes.save(&quote).await {
                Ok(()) => return Ok(quote),
                Err(error) if error.is_unique_violation() && reallocations < 3 => {
                    reallocations += 1;
                    quote.quote_number = self.next_quote_number().await?;
                }
                Err(error) => return Err(persistence(error)),
            }
        }
    }

    /// Commit a status move with compare-and-set on the previously observed
    /// status. A lost race means the stored row moved on under us, which is
    /// exactly an invalid transition from the caller's point of view.
    async fn commit_transition(
        &self,
        quote: &Quote,
        expected: QuoteStatus,
    ) -> Result<(), ApplicationError> {
        let applied =
            self.quotes.save_transition(quote, expected).await.map_err(persistence)?;
        if !applied {
            return Err(DomainError::InvalidTransition { from: expected, to: quote.status }.into());
        }
        Ok(())
    }

    fn emit_lifecycle(
        &self,
        quote: &Quote,
        correlation_id: &str,
        event_type: &str,
        actor: &str,
        from: Option<QuoteStatus>,
    ) {
        let mut event = AuditEvent::new(
            Some(quote.id.clone()),
            Some(quote.lead_id.0.clone()),
            correlation_id,
            event_type,
            AuditCategory::Lifecycle,
            actor,
            AuditOutcome::Success,
        )
        .with_metadata("to", status_label(quote.status));
        if let Some(from) = from {
            event = event.with_metadata("from", status_label(from));
        }
        self.audit.emit(event);
    }

    /// Create a quote against an existing lead. The initial status comes
    /// from the margin floor over the submitted lines; the sharing terms are
    /// snapshotted from the lead at this moment.
    pub async fn create_quote(
        &self,
        caller: &Principal,
        input: NewQuoteInput,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        let lead = self.require_lead(&input.lead_id).await?;

        let mut items: Vec<LineItem> = input
            .items
            .into_iter()
            .map(|line| LineItem {
                sl_no: 0,
                product: line.product,
                description: line.description,
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                margin_percent: line.margin_percent,
                vat_percent: line.vat_percent,
            })
            .collect();
        resequence(&mut items);
        validate_items(&items)?;
        validate_discount(input.discount_mode, input.discount_value)?;

        let (status, is_approved) = initial_state(&items);
        let now = Utc::now();
        let quote = Quote {
            id: QuoteId(Uuid::new_v4().to_string()),
            quote_number: self.next_quote_number().await?,
            lead_id: lead.id.clone(),
            status,
            is_approved,
            reject_note: None,
            discount_mode: input.discount_mode,
            discount_value: input.discount_value,
            share_percent: lead.share_percent,
            currency: input.currency,
            customer_name: input.customer_name,
            contact_person: input.contact_person,
            phone: input.phone,
            email: input.email,
            address: input.address,
            items,
            created_at: now,
            updated_at: now,
        };

        let quote = self.persist_new_quote(quote).await?;
        self.emit_lifecycle(&quote, correlation_id, "lifecycle.quote_created", &caller.user_id, None);
        Ok(quote)
    }

    /// Clone an existing quote into a fresh one on the same lead. The clone
    /// gets its own id and number and re-runs the creation rule over its own
    /// lines; nothing about approval or rejection carries over.
    pub async fn clone_quote(
        &self,
        caller: &Principal,
        source_id: &QuoteId,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        let source = self.require_quote(source_id).await?;
        let (status, is_approved) = initial_state(&source.items);
        let now = Utc::now();

        let clone = Quote {
            id: QuoteId(Uuid::new_v4().to_string()),
            quote_number: self.next_quote_number().await?,
            status,
            is_approved,
            reject_note: None,
            created_at: now,
            updated_at: now,
            ..source.clone()
        };

        let clone = self.persist_new_quote(clone).await?;
        self.audit.emit(
            AuditEvent::new(
                Some(clone.id.clone()),
                Some(clone.lead_id.0.clone()),
                correlation_id,
                "lifecycle.quote_cloned",
                AuditCategory::Lifecycle,
                &caller.user_id,
                AuditOutcome::Success,
            )
            .with_metadata("source_quote_id", source.id.0.clone())
            .with_metadata("to", status_label(clone.status)),
        );
        Ok(clone)
    }

    pub async fn approve(
        &self,
        caller: &Principal,
        quote_id: &QuoteId,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        let mut quote = self.require_quote(quote_id).await?;
        let expected = quote.status;
        quote.approve(caller)?;
        quote.updated_at = Utc::now();
        self.commit_transition(&quote, expected).await?;
        self.emit_lifecycle(
            &quote,
            correlation_id,
            "lifecycle.quote_approved",
            &caller.user_id,
            Some(expected),
        );
        Ok(quote)
    }

    pub async fn reject(
        &self,
        caller: &Principal,
        quote_id: &QuoteId,
        note: &str,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        let mut quote = self.require_quote(quote_id).await?;
        let expected = quote.status;
        quote.reject(caller, note)?;
        quote.updated_at = Utc::now();
        self.commit_transition(&quote, expected).await?;
        self.emit_lifecycle(
            &quote,
            correlation_id,
            "lifecycle.quote_rejected",
            &caller.user_id,
            Some(expected),
        );
        Ok(quote)
    }

    pub async fn update_status(
        &self,
        caller: &Principal,
        quote_id: &QuoteId,
        next: QuoteStatus,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        let mut quote = self.require_quote(quote_id).await?;
        let expected = quote.status;
        quote.update_status(caller, next)?;
        quote.updated_at = Utc::now();
        self.commit_transition(&quote, expected).await?;
        self.emit_lifecycle(
            &quote,
            correlation_id,
            "lifecycle.quote_status_changed",
            &caller.user_id,
            Some(expected),
        );
        Ok(quote)
    }

    /// Point a lead at one of its own quotes by number. The number must
    /// belong to a quote on that lead; numbers from other leads do not
    /// resolve.
    pub async fn set_main_quote(
        &self,
        caller: &Principal,
        lead_id: &LeadId,
        number: &QuoteNumber,
        correlation_id: &str,
    ) -> Result<Lead, ApplicationError> {
        let mut lead = self.require_lead(lead_id).await?;
        let quote = self
            .quotes
            .find_by_number(lead_id, number)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::not_found("quote", number.0.clone()))?;

        let updated =
            self.leads.set_main_quote(lead_id, number).await.map_err(persistence)?;
        if !updated {
            return Err(DomainError::not_found("lead", lead_id.0.clone()).into());
        }
        lead.main_quote_number = Some(number.clone());

        self.audit.emit(
            AuditEvent::new(
                Some(quote.id.clone()),
                Some(lead.id.0.clone()),
                correlation_id,
                "lifecycle.main_quote_selected",
                AuditCategory::Lifecycle,
                &caller.user_id,
                AuditOutcome::Success,
            )
            .with_metadata("quote_number", number.0.clone()),
        );
        Ok(lead)
    }

    /// All quotes on a lead, oldest first.
    pub async fn quotes_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Quote>, ApplicationError> {
        self.require_lead(lead_id).await?;
        self.quotes.list_for_lead(lead_id).await.map_err(persistence)
    }

    /// Load a quote together with totals recomputed from its stored lines.
    /// Totals are derived state; they are never read back from storage.
    pub async fn quote_with_totals(
        &self,
        quote_id: &QuoteId,
    ) -> Result<(Quote, QuoteTotals), ApplicationError> {
        let quote = self.require_quote(quote_id).await?;
        let lead = self.require_lead(&quote.lead_id).await?;
        let totals = compute_totals(
            &quote.items,
            quote.discount_mode,
            quote.discount_value,
            quote.share_percent,
            lead.is_shared(),
        );
        Ok((quote, totals))
    }

    /// Same as [`Self::quote_with_totals`] but gated for document rendering:
    /// unapproved quotes render only for privileged callers.
    pub async fn quote_for_document(
        &self,
        caller: &Principal,
        quote_id: &QuoteId,
    ) -> Result<(Quote, QuoteTotals), ApplicationError> {
        let (quote, totals) = self.quote_with_totals(quote_id).await?;
        if !quote.can_download(caller) {
            return Err(DomainError::Unauthorized {
                actor: caller.user_id.clone(),
                action: format!("download quote `{}` before approval", quote.quote_number.0),
            }
            .into());
        }
        Ok((quote, totals))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::{Datelike, Utc};
    use rust_decimal::Decimal;

    use dealdesk_core::audit::InMemoryAuditSink;
    use dealdesk_core::domain::lead::{Lead, LeadId};
    use dealdesk_core::domain::principal::Principal;
    use dealdesk_core::domain::quote::{Quote, QuoteId, QuoteNumber, QuoteStatus};
    use dealdesk_core::errors::{ApplicationError, DomainError};
    use dealdesk_core::pricing::DiscountMode;

    use dealdesk_db::{
        InMemoryLeadRepository, InMemoryQuoteRepository, LeadRepository, QuoteRepository,
        RepositoryError,
    };

    use super::{LineItemInput, NewQuoteInput, QuoteWorkflow};

    fn line(product: &str, margin_percent: Decimal) -> LineItemInput {
        LineItemInput {
            product: product.to_string(),
            description: None,
            quantity: Decimal::new(2, 0),
            unit_cost: Decimal::new(10_000, 2),
            margin_percent,
            vat_percent: Decimal::new(500, 2),
        }
    }

    fn input(lead_id: &str, items: Vec<LineItemInput>) -> NewQuoteInput {
        NewQuoteInput {
            lead_id: LeadId(lead_id.to_string()),
            currency: "USD".to_string(),
            customer_name: "Acme Networks".to_string(),
            contact_person: None,
            phone: None,
            email: None,
            address: None,
            discount_mode: DiscountMode::Percent,
            discount_value: Decimal::ZERO,
            items,
        }
    }

    async fn workflow_with_lead() -> (QuoteWorkflow, InMemoryAuditSink) {
        let leads = Arc::new(InMemoryLeadRepository::default());
        let now = Utc::now();
        leads
            .save(&Lead {
                id: LeadId("lead-1".to_string()),
                company: "Acme Networks".to_string(),
                main_quote_number: None,
                shared_with: Some("u-partner".to_string()),
                share_percent: Decimal::new(2000, 2),
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed lead");

        let sink = InMemoryAuditSink::default();
        let workflow = QuoteWorkflow::new(
            Arc::new(InMemoryQuoteRepository::default()),
            leads,
            Arc::new(sink.clone()),
        );
        (workflow, sink)
    }

    #[tokio::test]
    async fn create_assigns_sequential_numbers_and_applies_the_margin_floor() {
        let (workflow, sink) = workflow_with_lead().await;
        let admin = Principal::admin("u-admin");

        let healthy = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(1200, 2))]), "req-1")
            .await
            .expect("create healthy");
        assert_eq!(healthy.status, QuoteStatus::Draft);
        assert!(healthy.is_approved);
        assert_eq!(healthy.quote_number.0, format!("Q-{}-0001", Utc::now().year()));
        assert_eq!(healthy.share_percent, Decimal::new(2000, 2));

        let thin = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(450, 2))]), "req-2")
            .await
            .expect("create thin");
        assert_eq!(thin.status, QuoteStatus::PendingApproval);
        assert!(!thin.is_approved);
        assert_eq!(thin.quote_number.0, format!("Q-{}-0002", Utc::now().year()));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_type == "lifecycle.quote_created"));
    }

    #[tokio::test]
    async fn create_against_missing_lead_is_not_found() {
        let (workflow, _) = workflow_with_lead().await;
        let error = workflow
            .create_quote(
                &Principal::member("u-rep"),
                input("lead-missing", vec![line("Router", Decimal::new(1200, 2))]),
                "req-1",
            )
            .await
            .expect_err("missing lead");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::NotFound { kind: "lead", .. })
        ));
    }

    #[tokio::test]
    async fn approve_then_send_then_accept_walks_the_lifecycle() {
        let (workflow, sink) = workflow_with_lead().await;
        let admin = Principal::admin("u-admin");
        let member = Principal::member("u-rep");

        let quote = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(450, 2))]), "req-1")
            .await
            .expect("create");
        assert_eq!(quote.status, QuoteStatus::PendingApproval);

        let error = workflow
            .update_status(&member, &quote.id, QuoteStatus::Sent, "req-2")
            .await
            .expect_err("pending cannot be sent");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InvalidTransition { .. })
        ));

        let approved = workflow.approve(&admin, &quote.id, "req-3").await.expect("approve");
        assert_eq!(approved.status, QuoteStatus::Draft);
        assert!(approved.is_approved);

        let sent = workflow
            .update_status(&member, &quote.id, QuoteStatus::Sent, "req-4")
            .await
            .expect("draft -> sent");
        assert_eq!(sent.status, QuoteStatus::Sent);

        let accepted = workflow
            .update_status(&admin, &quote.id, QuoteStatus::Accepted, "req-5")
            .await
            .expect("sent -> accepted");
        assert_eq!(accepted.status, QuoteStatus::Accepted);

        let final_error = workflow
            .update_status(&admin, &quote.id, QuoteStatus::Draft, "req-6")
            .await
            .expect_err("accepted is final");
        assert!(matches!(
            final_error,
            ApplicationError::Domain(DomainError::InvalidTransition { .. })
        ));

        let events = sink.events();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert!(types.contains(&"lifecycle.quote_approved"));
        assert_eq!(types.iter().filter(|t| **t == "lifecycle.quote_status_changed").count(), 2);
    }

    #[tokio::test]
    async fn reject_requires_a_note_and_is_terminal() {
        let (workflow, _) = workflow_with_lead().await;
        let admin = Principal::admin("u-admin");

        let quote = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(450, 2))]), "req-1")
            .await
            .expect("create");

        let error = workflow.reject(&admin, &quote.id, "  ", "req-2").await.expect_err("blank note");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Validation(_))));

        let rejected = workflow
            .reject(&admin, &quote.id, "margin too thin", "req-3")
            .await
            .expect("reject");
        assert_eq!(rejected.status, QuoteStatus::Rejected);
        assert_eq!(rejected.reject_note.as_deref(), Some("margin too thin"));

        let error = workflow.approve(&admin, &quote.id, "req-4").await.expect_err("rejected is final");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn racing_approvals_resolve_to_a_single_winner() {
        let (workflow, _) = workflow_with_lead().await;
        let admin = Principal::admin("u-admin");

        let quote = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(450, 2))]), "req-1")
            .await
            .expect("create");

        let first = workflow.approve(&admin, &quote.id, "req-2").await;
        let second = workflow.reject(&admin, &quote.id, "too thin", "req-3").await;

        assert!(first.is_ok());
        assert!(matches!(
            second.expect_err("loser observes a stale status"),
            ApplicationError::Domain(DomainError::InvalidTransition { .. })
        ));
    }

    /// Quote store where the first insert loses its number to a rival row
    /// committed in the same instant, the way two concurrent creates
    /// interleave between the number read and the insert.
    struct ContendedQuoteRepository {
        inner: InMemoryQuoteRepository,
        rival_committed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl QuoteRepository for ContendedQuoteRepository {
        async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_number(
            &self,
            lead_id: &LeadId,
            number: &QuoteNumber,
        ) -> Result<Option<Quote>, RepositoryError> {
            self.inner.find_by_number(lead_id, number).await
        }

        async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Quote>, RepositoryError> {
            self.inner.list_for_lead(lead_id).await
        }

        async fn max_number_with_prefix(
            &self,
            prefix: &str,
        ) -> Result<Option<String>, RepositoryError> {
            self.inner.max_number_with_prefix(prefix).await
        }

        async fn save(&self, quote: &Quote) -> Result<(), RepositoryError> {
            if !self.rival_committed.swap(true, Ordering::SeqCst) {
                let mut rival = quote.clone();
                rival.id = QuoteId("qt-rival".to_string());
                self.inner.save(&rival).await?;
            }
            self.inner.save(quote).await
        }

        async fn save_transition(
            &self,
            quote: &Quote,
            expected: QuoteStatus,
        ) -> Result<bool, RepositoryError> {
            self.inner.save_transition(quote, expected).await
        }
    }

    #[tokio::test]
    async fn create_reallocates_its_number_when_a_concurrent_create_wins_it() {
        let leads = Arc::new(InMemoryLeadRepository::default());
        let now = Utc::now();
        leads
            .save(&Lead {
                id: LeadId("lead-1".to_string()),
                company: "Acme Networks".to_string(),
                main_quote_number: None,
                shared_with: None,
                share_percent: Decimal::ZERO,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed lead");

        let quotes = Arc::new(ContendedQuoteRepository {
            inner: InMemoryQuoteRepository::default(),
            rival_committed: AtomicBool::new(false),
        });
        let workflow =
            QuoteWorkflow::new(quotes.clone(), leads, Arc::new(InMemoryAuditSink::default()));
        let admin = Principal::admin("u-admin");

        let quote = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(1200, 2))]), "req-1")
            .await
            .expect("create survives a lost number");

        let year = Utc::now().year();
        assert_eq!(quote.quote_number.0, format!("Q-{year}-0002"));

        let rival = quotes
            .find_by_id(&QuoteId("qt-rival".to_string()))
            .await
            .expect("find rival")
            .expect("rival exists");
        assert_eq!(rival.quote_number.0, format!("Q-{year}-0001"));
    }

    #[tokio::test]
    async fn clone_re_runs_the_creation_rule_and_drops_history() {
        let (workflow, _) = workflow_with_lead().await;
        let admin = Principal::admin("u-admin");

        let source = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(450, 2))]), "req-1")
            .await
            .expect("create");
        workflow.reject(&admin, &source.id, "margin too thin", "req-2").await.expect("reject");

        let clone = workflow.clone_quote(&admin, &source.id, "req-3").await.expect("clone");
        assert_ne!(clone.id, source.id);
        assert_ne!(clone.quote_number, source.quote_number);
        assert_eq!(clone.status, QuoteStatus::PendingApproval);
        assert!(!clone.is_approved);
        assert!(clone.reject_note.is_none());
    }

    #[tokio::test]
    async fn main_quote_selection_only_resolves_numbers_on_the_same_lead() {
        let (workflow, _) = workflow_with_lead().await;
        let admin = Principal::admin("u-admin");

        let quote = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(1200, 2))]), "req-1")
            .await
            .expect("create");

        let lead = workflow
            .set_main_quote(&admin, &LeadId("lead-1".to_string()), &quote.quote_number, "req-2")
            .await
            .expect("set main quote");
        assert_eq!(lead.main_quote_number, Some(quote.quote_number.clone()));

        let error = workflow
            .set_main_quote(
                &admin,
                &LeadId("lead-1".to_string()),
                &QuoteNumber("Q-1999-0001".to_string()),
                "req-3",
            )
            .await
            .expect_err("unknown number");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::NotFound { kind: "quote", .. })
        ));
    }

    #[tokio::test]
    async fn totals_are_recomputed_with_the_lead_sharing_flag() {
        let (workflow, _) = workflow_with_lead().await;
        let admin = Principal::admin("u-admin");

        let quote = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(1000, 2))]), "req-1")
            .await
            .expect("create");

        let (_, totals) = workflow.quote_with_totals(&quote.id).await.expect("totals");
        // 2 x 100 cost, 10% margin: subtotal 220, VAT 11, shared 20% of 231.
        assert_eq!(totals.subtotal.round_dp(2), Decimal::new(22_000, 2));
        assert_eq!(totals.grand_total.round_dp(2), Decimal::new(23_100, 2));
        assert_eq!(totals.shared_profit.round_dp(2), Decimal::new(4620, 2));
    }

    #[tokio::test]
    async fn document_gate_blocks_members_until_approval() {
        let (workflow, _) = workflow_with_lead().await;
        let admin = Principal::admin("u-admin");
        let member = Principal::member("u-rep");

        let quote = workflow
            .create_quote(&admin, input("lead-1", vec![line("Router", Decimal::new(450, 2))]), "req-1")
            .await
            .expect("create");

        let error = workflow
            .quote_for_document(&member, &quote.id)
            .await
            .expect_err("unapproved quote");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Unauthorized { .. })));

        // Privileged callers can always preview.
        workflow.quote_for_document(&admin, &quote.id).await.expect("admin preview");

        workflow.approve(&admin, &quote.id, "req-2").await.expect("approve");
        workflow.quote_for_document(&member, &quote.id).await.expect("approved download");
    }
}
