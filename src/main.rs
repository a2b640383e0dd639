use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use rulegov::api::routes::{create_router, AppState};
use rulegov::artifacts::{ArtifactStore, FilesystemStore, S3Config, S3Store};
use rulegov::config::Config;
use rulegov::observability::init_tracing;
use rulegov::services::{RegistryService, RulesetPublisher};
use rulegov::storage::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    init_tracing(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        region = %config.region,
        "Starting rulegov governance service"
    );

    // Persistence: Postgres in any real deployment, in-memory when no
    // database is configured (local development).
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url, config.db_min_connections, config.db_max_connections)
                .await
                .map_err(|e| anyhow::anyhow!("database connection failed: {e}"))?;
            pg.seed_standard_fields()
                .await
                .map_err(|e| anyhow::anyhow!("standard field seeding failed: {e}"))?;
            info!("Connected to Postgres");
            Arc::new(pg)
        }
        None => {
            warn!("No database configured, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // Artifact backend is runtime configuration, not a compile-time choice.
    let artifacts: Arc<dyn ArtifactStore> = if config.uses_s3() {
        let endpoint = config
            .s3_endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("s3 backend requires RULEGOV_S3_ENDPOINT"))?;
        let bucket = config
            .s3_bucket
            .clone()
            .ok_or_else(|| anyhow::anyhow!("s3 backend requires RULEGOV_S3_BUCKET"))?;
        let s3 = S3Store::new(S3Config {
            endpoint,
            bucket,
            region: config.s3_region.clone(),
            access_key_id: config.s3_access_key_id.clone(),
            secret_access_key: config.s3_secret_access_key.clone(),
            path_style: config.s3_path_style,
            timeout_secs: 30,
        })
        .map_err(|e| anyhow::anyhow!("object storage client failed: {e}"))?;
        info!(backend = "s3", "Artifact backend initialized");
        Arc::new(s3)
    } else {
        info!(backend = "filesystem", dir = %config.artifact_dir.display(), "Artifact backend initialized");
        Arc::new(FilesystemStore::new(config.artifact_dir.clone()))
    };

    let registry = Arc::new(RegistryService::new(
        store.clone(),
        artifacts.clone(),
        config.artifact_prefix.clone(),
    ));
    let publisher = Arc::new(RulesetPublisher::new(
        artifacts,
        config.artifact_prefix.clone(),
    ));

    let state = Arc::new(AppState {
        store,
        registry,
        publisher,
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let app = create_router(state);
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves when the process is asked to stop. In-flight governance
/// requests (including publishes mid-transaction) drain before the
/// listener closes; aborted publishes roll back with their approvals.
async fn shutdown_signal() {
    #[cfg(unix)]
    let received = {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        tokio::select! {
            result = signal::ctrl_c() => {
                result.expect("Failed to install Ctrl+C handler");
                "SIGINT"
            }
            _ = sigterm.recv() => "SIGTERM",
        }
    };

    #[cfg(not(unix))]
    let received = {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        "SIGINT"
    };

    info!(signal = received, "Shutdown requested, draining in-flight requests");
}
