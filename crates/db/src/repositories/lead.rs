use sqlx::Row;

use dealdesk_core::domain::lead::{Lead, LeadId};
use dealdesk_core::domain::quote::QuoteNumber;

use super::quote::{parse_datetime, parse_decimal};
use super::{LeadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_lead(row: &sqlx::sqlite::SqliteRow) -> Result<Lead, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let company: String =
        row.try_get("company").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let main_quote_number: Option<String> =
        row.try_get("main_quote_number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let shared_with: Option<String> =
        row.try_get("shared_with").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let share_percent: String =
        row.try_get("share_percent").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Lead {
        id: LeadId(id),
        company,
        main_quote_number: main_quote_number.map(QuoteNumber),
        shared_with,
        share_percent: parse_decimal("share_percent", &share_percent)?,
        created_at: parse_datetime("created_at", &created_at)?,
        updated_at: parse_datetime("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, company, main_quote_number, shared_with, share_percent,
                    created_at, updated_at
             FROM lead WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_lead(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, lead: &Lead) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO lead (id, company, main_quote_number, shared_with, share_percent,
                               created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 company = excluded.company,
                 main_quote_number = excluded.main_quote_number,
                 shared_with = excluded.shared_with,
                 share_percent = excluded.share_percent,
                 updated_at = excluded.updated_at",
        )
        .bind(&lead.id.0)
        .bind(&lead.company)
        .bind(lead.main_quote_number.as_ref().map(|n| n.0.clone()))
        .bind(&lead.shared_with)
        .bind(lead.share_percent.to_string())
        .bind(lead.created_at.to_rfc3339())
        .bind(lead.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_main_quote(
        &self,
        id: &LeadId,
        number: &QuoteNumber,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE lead SET main_quote_number = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&number.0)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use dealdesk_core::domain::lead::{Lead, LeadId};
    use dealdesk_core::domain::quote::QuoteNumber;

    use super::SqlLeadRepository;
    use crate::repositories::LeadRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_lead(id: &str) -> Lead {
        let now = Utc::now();
        Lead {
            id: LeadId(id.to_string()),
            company: "Acme Networks".to_string(),
            main_quote_number: None,
            shared_with: Some("u-partner".to_string()),
            share_percent: Decimal::new(2500, 2),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_sharing_terms() {
        let pool = setup().await;
        let repo = SqlLeadRepository::new(pool);

        repo.save(&sample_lead("lead-1")).await.expect("save");

        let found = repo
            .find_by_id(&LeadId("lead-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.company, "Acme Networks");
        assert_eq!(found.shared_with.as_deref(), Some("u-partner"));
        assert_eq!(found.share_percent, Decimal::new(2500, 2));
        assert!(found.is_shared());
        assert!(found.main_quote_number.is_none());
    }

    #[tokio::test]
    async fn set_main_quote_updates_the_pointer() {
        let pool = setup().await;
        let repo = SqlLeadRepository::new(pool);
        repo.save(&sample_lead("lead-1")).await.expect("save");

        let updated = repo
            .set_main_quote(&LeadId("lead-1".to_string()), &QuoteNumber("Q-2026-0007".to_string()))
            .await
            .expect("set main quote");
        assert!(updated);

        let found = repo
            .find_by_id(&LeadId("lead-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.main_quote_number, Some(QuoteNumber("Q-2026-0007".to_string())));
    }

    #[tokio::test]
    async fn set_main_quote_reports_missing_lead_rows() {
        let pool = setup().await;
        let repo = SqlLeadRepository::new(pool);

        let updated = repo
            .set_main_quote(&LeadId("lead-missing".to_string()), &QuoteNumber("Q-1".to_string()))
            .await
            .expect("set main quote");
        assert!(!updated);
    }
}
