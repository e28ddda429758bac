//! In-memory repository doubles for workflow and handler tests. The quote
//! double mirrors the SQL compare-and-set semantics under a single mutex, so
//! racing transitions resolve the same way they do against the database.

use std::collections::HashMap;
use std::sync::Mutex;

use dealdesk_core::domain::lead::{Lead, LeadId};
use dealdesk_core::domain::quote::{Quote, QuoteId, QuoteNumber, QuoteStatus};

use super::{LeadRepository, QuoteRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: Mutex<HashMap<String, Quote>>,
}

impl InMemoryQuoteRepository {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Quote>> {
        match self.quotes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        Ok(self.lock().get(&id.0).cloned())
    }

    async fn find_by_number(
        &self,
        lead_id: &LeadId,
        number: &QuoteNumber,
    ) -> Result<Option<Quote>, RepositoryError> {
        Ok(self
            .lock()
            .values()
            .find(|quote| quote.lead_id == *lead_id && quote.quote_number == *number)
            .cloned())
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Quote>, RepositoryError> {
        let mut quotes: Vec<Quote> =
            self.lock().values().filter(|quote| quote.lead_id == *lead_id).cloned().collect();
        quotes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(quotes)
    }

    async fn max_number_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .lock()
            .values()
            .filter(|quote| quote.quote_number.0.starts_with(prefix))
            .map(|quote| quote.quote_number.0.clone())
            .max())
    }

    async fn save(&self, quote: &Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.lock();
        // Same UNIQUE(quote_number) rule the schema enforces.
        let number_taken = quotes
            .values()
            .any(|stored| stored.id != quote.id && stored.quote_number == quote.quote_number);
        if number_taken {
            return Err(RepositoryError::UniqueViolation(format!(
                "quote_number `{}` already allocated",
                quote.quote_number.0
            )));
        }
        quotes.insert(quote.id.0.clone(), quote.clone());
        Ok(())
    }

    async fn save_transition(
        &self,
        quote: &Quote,
        expected: QuoteStatus,
    ) -> Result<bool, RepositoryError> {
        let mut quotes = self.lock();
        match quotes.get_mut(&quote.id.0) {
            Some(stored) if stored.status == expected => {
                stored.status = quote.status;
                stored.is_approved = quote.is_approved;
                stored.reject_note = quote.reject_note.clone();
                stored.updated_at = quote.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: Mutex<HashMap<String, Lead>>,
}

impl InMemoryLeadRepository {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Lead>> {
        match self.leads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.lock().get(&id.0).cloned())
    }

    async fn save(&self, lead: &Lead) -> Result<(), RepositoryError> {
        self.lock().insert(lead.id.0.clone(), lead.clone());
        Ok(())
    }

    async fn set_main_quote(
        &self,
        id: &LeadId,
        number: &QuoteNumber,
    ) -> Result<bool, RepositoryError> {
        let mut leads = self.lock();
        match leads.get_mut(&id.0) {
            Some(lead) => {
                lead.main_quote_number = Some(number.clone());
                lead.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
