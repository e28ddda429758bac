use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use dealdesk_core::domain::lead::LeadId;
use dealdesk_core::domain::quote::{LineItem, Quote, QuoteId, QuoteNumber, QuoteStatus};
use dealdesk_core::pricing::DiscountMode;

use super::{QuoteRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub fn status_as_str(status: QuoteStatus) -> &'static str {
    match status {
        QuoteStatus::Draft => "draft",
        QuoteStatus::PendingApproval => "pending_approval",
        QuoteStatus::Sent => "sent",
        QuoteStatus::Accepted => "accepted",
        QuoteStatus::Rejected => "rejected",
        QuoteStatus::Expired => "expired",
    }
}

pub fn parse_status(raw: &str) -> Result<QuoteStatus, RepositoryError> {
    match raw {
        "draft" => Ok(QuoteStatus::Draft),
        "pending_approval" => Ok(QuoteStatus::PendingApproval),
        "sent" => Ok(QuoteStatus::Sent),
        "accepted" => Ok(QuoteStatus::Accepted),
        "rejected" => Ok(QuoteStatus::Rejected),
        "expired" => Ok(QuoteStatus::Expired),
        other => Err(RepositoryError::Decode(format!("unknown quote status `{other}`"))),
    }
}

fn mode_as_str(mode: DiscountMode) -> &'static str {
    match mode {
        DiscountMode::Percent => "percent",
        DiscountMode::Amount => "amount",
    }
}

fn parse_mode(raw: &str) -> Result<DiscountMode, RepositoryError> {
    match raw {
        "percent" => Ok(DiscountMode::Percent),
        "amount" => Ok(DiscountMode::Amount),
        other => Err(RepositoryError::Decode(format!("unknown discount mode `{other}`"))),
    }
}

pub(crate) fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("column `{column}`: {e}")))
}

pub(crate) fn parse_datetime(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("column `{column}`: {e}")))
}

fn get_text(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<String, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn get_text_opt(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<String>, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> Result<LineItem, RepositoryError> {
    let sl_no: i64 = row.try_get("sl_no").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(LineItem {
        sl_no: sl_no as u32,
        product: get_text(row, "product")?,
        description: get_text_opt(row, "description")?,
        quantity: parse_decimal("quantity", &get_text(row, "quantity")?)?,
        unit_cost: parse_decimal("unit_cost", &get_text(row, "unit_cost")?)?,
        margin_percent: parse_decimal("margin_percent", &get_text(row, "margin_percent")?)?,
        vat_percent: parse_decimal("vat_percent", &get_text(row, "vat_percent")?)?,
    })
}

fn row_to_quote(
    row: &sqlx::sqlite::SqliteRow,
    items: Vec<LineItem>,
) -> Result<Quote, RepositoryError> {
    let is_approved: i64 =
        row.try_get("is_approved").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Quote {
        id: QuoteId(get_text(row, "id")?),
        quote_number: QuoteNumber(get_text(row, "quote_number")?),
        lead_id: LeadId(get_text(row, "lead_id")?),
        status: parse_status(&get_text(row, "status")?)?,
        is_approved: is_approved != 0,
        reject_note: get_text_opt(row, "reject_note")?,
        discount_mode: parse_mode(&get_text(row, "discount_mode")?)?,
        discount_value: parse_decimal("discount_value", &get_text(row, "discount_value")?)?,
        share_percent: parse_decimal("share_percent", &get_text(row, "share_percent")?)?,
        currency: get_text(row, "currency")?,
        customer_name: get_text(row, "customer_name")?,
        contact_person: get_text_opt(row, "contact_person")?,
        phone: get_text_opt(row, "phone")?,
        email: get_text_opt(row, "email")?,
        address: get_text_opt(row, "address")?,
        items,
        created_at: parse_datetime("created_at", &get_text(row, "created_at")?)?,
        updated_at: parse_datetime("updated_at", &get_text(row, "updated_at")?)?,
    })
}

const QUOTE_COLUMNS: &str = "id, quote_number, lead_id, status, is_approved, reject_note,
       discount_mode, discount_value, share_percent, currency, customer_name,
       contact_person, phone, email, address, created_at, updated_at";

impl SqlQuoteRepository {
    async fn load_lines(&self, quote_id: &QuoteId) -> Result<Vec<LineItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT sl_no, product, description, quantity, unit_cost, margin_percent, vat_percent
             FROM quote_line WHERE quote_id = ? ORDER BY sl_no ASC",
        )
        .bind(&quote_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_line).collect()
    }

    async fn hydrate(
        &self,
        row: Option<sqlx::sqlite::SqliteRow>,
    ) -> Result<Option<Quote>, RepositoryError> {
        match row {
            Some(row) => {
                let id = QuoteId(get_text(&row, "id")?);
                let items = self.load_lines(&id).await?;
                Ok(Some(row_to_quote(&row, items)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        self.hydrate(row).await
    }

    async fn find_by_number(
        &self,
        lead_id: &LeadId,
        number: &QuoteNumber,
    ) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote WHERE lead_id = ? AND quote_number = ?"
        ))
        .bind(&lead_id.0)
        .bind(&number.0)
        .fetch_optional(&self.pool)
        .await?;

        self.hydrate(row).await
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote WHERE lead_id = ? ORDER BY created_at ASC"
        ))
        .bind(&lead_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut quotes = Vec::with_capacity(rows.len());
        for row in rows {
            let id = QuoteId(get_text(&row, "id")?);
            let items = self.load_lines(&id).await?;
            quotes.push(row_to_quote(&row, items)?);
        }
        Ok(quotes)
    }

    async fn max_number_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let max: Option<String> =
            sqlx::query_scalar("SELECT MAX(quote_number) FROM quote WHERE quote_number LIKE ? || '%'")
                .bind(prefix)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    async fn save(&self, quote: &Quote) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quote (id, quote_number, lead_id, status, is_approved, reject_note,
                                discount_mode, discount_value, share_percent, currency,
                                customer_name, contact_person, phone, email, address,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 is_approved = excluded.is_approved,
                 reject_note = excluded.reject_note,
                 discount_mode = excluded.discount_mode,
                 discount_value = excluded.discount_value,
                 share_percent = excluded.share_percent,
                 currency = excluded.currency,
                 customer_name = excluded.customer_name,
                 contact_person = excluded.contact_person,
                 phone = excluded.phone,
                 email = excluded.email,
                 address = excluded.address,
                 updated_at = excluded.updated_at",
        )
        .bind(&quote.id.0)
        .bind(&quote.quote_number.0)
        .bind(&quote.lead_id.0)
        .bind(status_as_str(quote.status))
        .bind(i64::from(quote.is_approved))
        .bind(&quote.reject_note)
        .bind(mode_as_str(quote.discount_mode))
        .bind(quote.discount_value.to_string())
        .bind(quote.share_percent.to_string())
        .bind(&quote.currency)
        .bind(&quote.customer_name)
        .bind(&quote.contact_person)
        .bind(&quote.phone)
        .bind(&quote.email)
        .bind(&quote.address)
        .bind(quote.created_at.to_rfc3339())
        .bind(quote.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM quote_line WHERE quote_id = ?")
            .bind(&quote.id.0)
            .execute(&mut *tx)
            .await?;

        for item in &quote.items {
            sqlx::query(
                "INSERT INTO quote_line (quote_id, sl_no, product, description, quantity,
                                         unit_cost, margin_percent, vat_percent)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&quote.id.0)
            .bind(i64::from(item.sl_no))
            .bind(&item.product)
            .bind(&item.description)
            .bind(item.quantity.to_string())
            .bind(item.unit_cost.to_string())
            .bind(item.margin_percent.to_string())
            .bind(item.vat_percent.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_transition(
        &self,
        quote: &Quote,
        expected: QuoteStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE quote
             SET status = ?, is_approved = ?, reject_note = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(status_as_str(quote.status))
        .bind(i64::from(quote.is_approved))
        .bind(&quote.reject_note)
        .bind(quote.updated_at.to_rfc3339())
        .bind(&quote.id.0)
        .bind(status_as_str(expected))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
