use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use payroll_ma::{
    app,
    config::Config,
    models::RuleBook,
    services::{
        delivery::DeliveryService,
        email::SmtpMailer,
        pdf::PdfRenderer,
        pipeline::PayrollPipeline,
        remote_renderer::RemoteRenderer,
        render::DocumentRenderer,
        repository::{BulletinRepository, InMemoryBulletinRepository, PgBulletinRepository},
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ─── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("payroll_ma=debug,tower_http=info")),
        )
        .with_max_level(Level::TRACE)
        .init();

    // ─── Config ───────────────────────────────────────────────────────────────
    let config = Config::from_env();
    let addr = config.server_addr();

    // ─── Rules ────────────────────────────────────────────────────────────────
    let rules = match &config.rules_path {
        Some(path) => RuleBook::from_path(path)
            .with_context(|| format!("Failed to load rule book from {path}"))?,
        None => RuleBook::bundled().context("Bundled rule book is invalid")?,
    };
    info!(tables = rules.tables().len(), "Rule book loaded");

    // ─── Storage ──────────────────────────────────────────────────────────────
    let repository: Arc<dyn BulletinRepository> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await
                .context("Failed to connect to Postgres")?;
            let repository = PgBulletinRepository::new(db);
            repository
                .migrate()
                .await
                .context("Failed to run database migrations")?;
            info!("Database connected and migrations applied");
            Arc::new(repository)
        }
        None => {
            warn!("DATABASE_URL not set, bulletins are kept in memory only");
            Arc::new(InMemoryBulletinRepository::new())
        }
    };

    // ─── Rendering & delivery ─────────────────────────────────────────────────
    let batch = config.batch_settings();
    let renderer: Arc<dyn DocumentRenderer> = match &config.renderer_url {
        Some(url) => Arc::new(
            RemoteRenderer::new(url, &config.renderer_template, batch.render_timeout)
                .context("Failed to build renderer client")?,
        ),
        None => Arc::new(PdfRenderer::new()),
    };
    info!(template = renderer.template_version(), "Renderer ready");

    let mailer = SmtpMailer::new(&config).context("Failed to configure SMTP")?;
    let delivery = DeliveryService::new(Arc::new(mailer), config.delivery_settings());

    // ─── App State ────────────────────────────────────────────────────────────
    let pipeline = PayrollPipeline::new(Arc::new(rules), repository, renderer, delivery, batch);
    let state = AppState::new(pipeline);
    let shutdown = state.shutdown.clone();

    // ─── Start Server ─────────────────────────────────────────────────────────
    info!("Paie Maroc API listening on http://{}", addr);
    info!("Swagger UI:  http://{}/docs", addr);
    info!("Health:      http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested, batch runs stop taking new work");
            shutdown.cancel();
        })
        .await
        .context("Server failed")?;

    Ok(())
}
