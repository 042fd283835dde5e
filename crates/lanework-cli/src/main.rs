use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lanework_core::app::AppBuilder;
use lanework_core::domain::Priority;
use lanework_core::handlers::{CsvExport, CsvExportHandler, EmailSend, EmailSendHandler, SmtpMailer};
use lanework_core::impls::{InMemoryJobStore, SqliteJobStore};
use lanework_core::ports::JobStore;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;

use config::{Config, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    init_logging(config.log_format)?;

    let store: Arc<dyn JobStore> = if config.uses_memory_store() {
        warn!("using in-memory job store; job status is lost on exit");
        Arc::new(InMemoryJobStore::new())
    } else {
        Arc::new(
            SqliteJobStore::connect(&config.database_url)
                .await
                .with_context(|| format!("failed to open job store at {}", config.database_url))?,
        )
    };

    let mailer = SmtpMailer::from_config(&config.mailer()).context("invalid mail configuration")?;

    let app = AppBuilder::new()
        .register::<CsvExport, _>(CsvExportHandler::new(&config.output_dir))?
        .register::<EmailSend, _>(EmailSendHandler::new(mailer))?
        .expect_types(&["CSV_EXPORT", "EMAIL_SEND"])
        .store(store)
        .concurrency(Priority::High, config.high_concurrency)
        .concurrency(Priority::Default, config.default_concurrency)
        .max_attempts(config.max_attempts)
        .retry_policy(config.retry_policy())
        .write_policy(config.write_policy())
        .build()?;

    let running = app
        .start()
        .await
        .context("failed to requeue unfinished jobs")?;

    let listener = TcpListener::bind(("0.0.0.0", config.api_port))
        .await
        .with_context(|| format!("failed to bind port {}", config.api_port))?;
    info!(port = config.api_port, "API listening");

    axum::serve(listener, api::router(running.service()))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server closed, draining workers");
    running.shutdown().await;
    Ok(())
}

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("failed to initialize JSON logging")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("failed to initialize pretty logging")?,
    }
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
