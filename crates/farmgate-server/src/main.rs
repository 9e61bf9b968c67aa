use std::sync::Arc;

use clap::Parser;
use farmgate_core::schema::{HARVEST_SCHEMA, compile};
use farmgate_server::cli::{Cli, Command};
use farmgate_server::config::{AppConfig, LogFormat};
use farmgate_server::metrics::Metrics;
use farmgate_server::rest;
use farmgate_server::service::AuthzService;
use farmgate_storage::InMemoryStore;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::CheckSchema { path }) => run_check_schema(&path),
        Some(Command::PrintSchema) => {
            print!("{HARVEST_SCHEMA}");
            Ok(())
        }
        Some(Command::Serve) | None => {
            let config = AppConfig::load(cli.config.as_deref())?;
            init_logging(&config);
            run_serve(config).await
        }
    }
}

fn run_check_schema(path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let schema = compile(&text)?;

    println!("{}: ok", path.display());
    for type_def in &schema.types {
        println!(
            "  {} ({} relations, {} permissions)",
            type_def.name,
            type_def.relations.len(),
            type_def.permissions.len()
        );
    }
    Ok(())
}

async fn run_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(rest_addr = %config.rest_addr(), "starting farmgate server");

    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(Metrics::new());
    let schema_text = config.load_schema_text()?;
    let service = Arc::new(
        AuthzService::bootstrap(
            store,
            &schema_text,
            config.to_engine_config(),
            config.to_schema_limits(),
        )
        .await?
        .with_staleness_window(config.staleness_window())
        .with_metrics(Arc::clone(&metrics)),
    );

    let router = rest::create_router(rest::AppState {
        service,
        metrics: Arc::clone(&metrics),
    });

    let rest_addr: std::net::SocketAddr = config.rest_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    tracing::info!(%rest_addr, "REST server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => { tracing::info!("received SIGINT"); }
                _ = sigterm.recv() => { tracing::info!("received SIGTERM"); }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler, using SIGINT only");
            let _ = ctrl_c.await;
            tracing::info!("received SIGINT");
        }
    }
}
