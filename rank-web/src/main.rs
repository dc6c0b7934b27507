mod cli;
mod config;
mod error;
mod render;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rank_core::{
    spawn_scheduler, AppConfig, HttpFeedSource, RankingService, RefreshOutcome, SnapshotStore,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::ServerConfig;
use crate::routes::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = Cli::parse().selected();
    init_tracing();

    let server = ServerConfig::from_env()?;
    let app_config = match &server.config_path {
        Some(path) => AppConfig::load_or_init(path),
        None => AppConfig::load(),
    };

    let snapshot_path = server.snapshot_path()?;
    tracing::info!(path = %snapshot_path.display(), "using snapshot store");

    let source = HttpFeedSource::from_config(&app_config.feed)
        .context("failed to build feed client")?;
    let service = Arc::new(
        RankingService::load(
            Arc::new(source),
            SnapshotStore::at(&snapshot_path),
            &app_config,
        )
        .await,
    );

    match command {
        Command::Once { csv } => run_once(service, csv).await,
        Command::Serve => serve(service, server).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn run_once(service: Arc<RankingService>, csv: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let outcome = service.refresh().await;

    let snapshot = service.snapshot().await;
    let tracked = service.tracked().await;
    let status = service.status().await;
    println!("{}", render::render_leaderboard(&snapshot, tracked.as_ref(), &status));

    if let Some(path) = csv {
        tokio::fs::write(&path, render::render_csv(&snapshot))
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), rows = snapshot.len(), "wrote CSV export");
    }

    match outcome {
        RefreshOutcome::Refreshed { .. } => Ok(()),
        RefreshOutcome::Failed(err) => Err(err).context("refresh failed"),
        RefreshOutcome::AlreadyRunning => anyhow::bail!("a refresh was already running"),
    }
}

async fn serve(service: Arc<RankingService>, server: ServerConfig) -> anyhow::Result<()> {
    let scheduler = spawn_scheduler(service.clone(), service.refresh_config().clone());
    let app = build_router(AppState { service });

    let listener = tokio::net::TcpListener::bind(server.addr)
        .await
        .with_context(|| format!("failed to bind {}", server.addr))?;
    tracing::info!("Listening on {}", server.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutting down scheduler");
    scheduler.stop().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
