use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use dealdesk_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

/// Tables the quote path cannot serve without.
const REQUIRED_TABLES: &[&str] = &["lead", "quote", "quote_line"];

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub component: &'static str,
    pub status: &'static str,
    pub detail: String,
}

impl ComponentHealth {
    fn ready(component: &'static str, detail: impl Into<String>) -> Self {
        Self { component, status: "ready", detail: detail.into() }
    }

    fn degraded(component: &'static str, detail: impl Into<String>) -> Self {
        Self { component, status: "degraded", detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub checks: Vec<ComponentHealth>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// Serve the health endpoint on its own port so probes keep answering even
/// when the API listener is saturated.
pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Readiness is the conjunction of the per-component checks: the pool must
/// answer a query, and the quote-path schema must actually be in place. A
/// connected database with no tables (migrations never ran) is not ready.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let checks =
        vec![connectivity_check(&state.db_pool).await, quote_schema_check(&state.db_pool).await];
    let ready = checks.iter().all(|check| check.status == "ready");

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        checks,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn connectivity_check(pool: &DbPool) -> ComponentHealth {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => ComponentHealth::ready("database", "query succeeded"),
        Err(error) => ComponentHealth::degraded("database", format!("query failed: {error}")),
    }
}

async fn quote_schema_check(pool: &DbPool) -> ComponentHealth {
    let present: Result<i64, sqlx::Error> = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master
         WHERE type = 'table' AND name IN ('lead', 'quote', 'quote_line')",
    )
    .fetch_one(pool)
    .await;

    let expected = REQUIRED_TABLES.len() as i64;
    match present {
        Ok(count) if count == expected => {
            ComponentHealth::ready("quote_schema", "all quote-path tables present")
        }
        Ok(count) => ComponentHealth::degraded(
            "quote_schema",
            format!("{count} of {expected} quote-path tables present; migrations pending"),
        ),
        Err(error) => {
            ComponentHealth::degraded("quote_schema", format!("schema lookup failed: {error}"))
        }
    }
}
