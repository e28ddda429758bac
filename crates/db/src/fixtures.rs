//! Deterministic demo dataset for local runs and the CLI `seed` command.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use dealdesk_core::domain::lead::{Lead, LeadId};
use dealdesk_core::domain::quote::{initial_state, LineItem, Quote, QuoteId, QuoteNumber};
use dealdesk_core::pricing::DiscountMode;

use crate::repositories::{
    LeadRepository, QuoteRepository, RepositoryError, SqlLeadRepository, SqlQuoteRepository,
};
use crate::DbPool;

#[derive(Debug, Serialize)]
pub struct SeedSummary {
    pub leads: usize,
    pub quotes: usize,
}

fn demo_lead() -> Lead {
    let now = Utc::now();
    Lead {
        id: LeadId("lead-demo-1".to_string()),
        company: "Harborline Logistics".to_string(),
        main_quote_number: None,
        shared_with: Some("u-partner".to_string()),
        share_percent: Decimal::new(2000, 2),
        created_at: now,
        updated_at: now,
    }
}

fn demo_quote(id: &str, number: &str, items: Vec<LineItem>) -> Quote {
    let now = Utc::now();
    let (status, is_approved) = initial_state(&items);
    Quote {
        id: QuoteId(id.to_string()),
        quote_number: QuoteNumber(number.to_string()),
        lead_id: LeadId("lead-demo-1".to_string()),
        status,
        is_approved,
        reject_note: None,
        discount_mode: DiscountMode::Percent,
        discount_value: Decimal::new(500, 2),
        share_percent: Decimal::new(2000, 2),
        currency: "USD".to_string(),
        customer_name: "Harborline Logistics".to_string(),
        contact_person: Some("Sam Okafor".to_string()),
        phone: Some("+1-555-0100".to_string()),
        email: Some("sam@harborline.example".to_string()),
        address: Some("12 Quay Street".to_string()),
        items,
        created_at: now,
        updated_at: now,
    }
}

fn line(sl_no: u32, product: &str, quantity: i64, unit_cost: Decimal, margin: Decimal) -> LineItem {
    LineItem {
        sl_no,
        product: product.to_string(),
        description: None,
        quantity: Decimal::new(quantity, 0),
        unit_cost,
        margin_percent: margin,
        vat_percent: Decimal::new(500, 2),
    }
}

/// Seed one shared lead with two quotes: one comfortably above the margin
/// floor (starts as Draft) and one undercutting it (starts in
/// PendingApproval). Idempotent: rows upsert by id.
pub async fn seed_demo_data(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let leads = SqlLeadRepository::new(pool.clone());
    let quotes = SqlQuoteRepository::new(pool.clone());

    leads.save(&demo_lead()).await?;

    let healthy = demo_quote(
        "qt-demo-1",
        "Q-2026-0001",
        vec![
            line(1, "Fleet tracking gateway", 4, Decimal::new(32_500, 2), Decimal::new(1200, 2)),
            line(2, "Install and onboarding", 1, Decimal::new(120_000, 2), Decimal::new(1800, 2)),
        ],
    );
    let undercut = demo_quote(
        "qt-demo-2",
        "Q-2026-0002",
        vec![line(1, "Fleet tracking gateway", 12, Decimal::new(32_500, 2), Decimal::new(450, 2))],
    );

    quotes.save(&healthy).await?;
    quotes.save(&undercut).await?;

    Ok(SeedSummary { leads: 1, quotes: 2 })
}
