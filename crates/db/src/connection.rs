use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use dealdesk_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Quote saves write a quote row and its lines in one short transaction, so
/// the SQLite busy timeout is derived from the configured acquire timeout
/// rather than fixed: a writer waiting on WAL should give up no later than a
/// caller waiting on the pool.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let timeout_secs = timeout_secs.max(1);
    let busy_timeout_ms = timeout_secs.saturating_mul(1000).min(30_000);

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // quote_line rows must never outlive their quote.
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
