mod api;
mod bootstrap;
mod health;
mod render;
mod workflow;

use std::sync::Arc;

use anyhow::Result;

use dealdesk_core::audit::TracingAuditSink;
use dealdesk_core::config::{AppConfig, LoadOptions};
use dealdesk_db::{SqlLeadRepository, SqlQuoteRepository};

use crate::api::AppState;
use crate::render::DocumentRenderer;
use crate::workflow::QuoteWorkflow;

fn init_logging(config: &AppConfig) {
    use dealdesk_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let renderer = match DocumentRenderer::new(
        &app.config.documents.template_dir,
        &app.config.documents.company_name,
    ) {
        Ok(renderer) => renderer,
        Err(error) => {
            tracing::warn!(
                event_name = "system.server.templates_fallback",
                correlation_id = "bootstrap",
                error = %error,
                "template directory unavailable, using embedded templates"
            );
            DocumentRenderer::with_embedded_templates(&app.config.documents.company_name)
        }
    };

    let workflow = QuoteWorkflow::new(
        Arc::new(SqlQuoteRepository::new(app.db_pool.clone())),
        Arc::new(SqlLeadRepository::new(app.db_pool.clone())),
        Arc::new(TracingAuditSink),
    );

    let router = api::router(AppState {
        workflow: Arc::new(workflow),
        renderer: Arc::new(renderer),
    });

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "dealdesk-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "dealdesk-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
