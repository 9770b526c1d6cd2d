// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon HTTP server implementation

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use central_core::{
    application::{
        Housekeeper, JobQueue, PolicyGate, ProviderManager, TaskService, UsageMonitor, WorkerPool,
    },
    domain::node_config::{resolve_secret, OrchestratorConfig},
    domain::repository::CallerDirectory,
    infrastructure::{
        db::Database,
        llm::AdapterSet,
        repositories::{PostgresCallerDirectory, PostgresUsageSink, StaticCallerDirectory},
        PromptComposer,
    },
    presentation::api,
};

pub async fn start_server(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config =
        OrchestratorConfig::load_or_default(config_path).context("Failed to load configuration")?;
    if let Some(host) = host {
        config.spec.network.bind_address = host;
    }
    if let Some(port) = port {
        config.spec.network.port = port;
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    info!(
        node = %config.metadata.name,
        providers = config.spec.providers.len(),
        workers = config.spec.queue.workers,
        "Configuration loaded"
    );

    let metrics = &config.spec.observability.metrics;
    if metrics.enabled {
        install_metrics_exporter(&config.spec.network.bind_address, metrics.port)?;
    }

    let shutdown = CancellationToken::new();
    let orchestrator = Orchestrator::build(&config, shutdown.clone()).await?;

    let app = api::app(orchestrator.service.clone());

    let addr = format!(
        "{}:{}",
        config.spec.network.bind_address, config.spec.network.port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("AI Central listening on {}", addr);

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await
        .context("HTTP server failed")?;

    info!("AI Central shutting down");
    shutdown.cancel();
    orchestrator.stop().await;

    Ok(())
}

/// Wired services plus the background tasks that run beside the HTTP API.
pub struct Orchestrator {
    pub service: Arc<TaskService>,
    pub queue: Arc<JobQueue>,
    pub monitor: Arc<UsageMonitor>,
    workers: WorkerPool,
    background: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    pub async fn build(config: &OrchestratorConfig, shutdown: CancellationToken) -> Result<Self> {
        let spec = &config.spec;

        let adapters =
            AdapterSet::from_config(&spec.providers).context("Failed to initialize AI providers")?;
        info!(providers = ?adapters.ids(), "Provider adapters ready");

        // Unreachable providers are reported but do not block startup
        for (provider, health) in adapters.health_check_all().await {
            if let Err(e) = health {
                warn!(provider = %provider, error = %e, "Provider health check failed");
            }
        }

        let database = match &spec.database {
            Some(db) => {
                info!("Connecting to PostgreSQL");
                let url = resolve_secret(&db.url).context("Failed to resolve database url")?;
                Some(Database::new(&url, db.max_connections).await?)
            }
            None => None,
        };

        let mut background = Vec::new();

        let monitor = match &database {
            Some(db) => {
                let sink = PostgresUsageSink::new(db.get_pool().clone());
                sink.ensure_schema()
                    .await
                    .context("Failed to prepare usage_records table")?;
                let (monitor, writer) =
                    UsageMonitor::with_sink(&spec.monitor, Arc::new(sink), shutdown.clone());
                background.push(writer);
                monitor
            }
            None => UsageMonitor::new(&spec.monitor),
        };
        let monitor = Arc::new(monitor);

        let callers: Arc<dyn CallerDirectory> = match &database {
            Some(db) => Arc::new(PostgresCallerDirectory::new(db.get_pool().clone())),
            None => {
                if spec.callers.is_empty() {
                    warn!("No callers configured; every task request will be rejected as unauthenticated");
                }
                Arc::new(StaticCallerDirectory::new(spec.callers.clone()))
            }
        };

        let composer = Arc::new(
            PromptComposer::new(&spec.prompts).context("Failed to compile prompt templates")?,
        );
        let gate = Arc::new(
            PolicyGate::new(spec.policy.clone(), monitor.clone())
                .context("Failed to initialize policy gate")?,
        );
        let manager = Arc::new(ProviderManager::new(
            adapters,
            composer,
            monitor.clone(),
            spec.consensus.clone(),
            spec.execution.retry_delay,
        ));
        let queue = Arc::new(JobQueue::new());

        let service = Arc::new(TaskService::new(
            manager,
            gate,
            queue.clone(),
            monitor.clone(),
            callers,
            spec.execution.generation_defaults(),
            spec.monitor.default_window,
        ));

        let workers = WorkerPool::spawn(
            spec.queue.workers,
            queue.clone(),
            service.clone(),
            shutdown.clone(),
        );

        background.push(
            Housekeeper::new(
                queue.clone(),
                monitor.clone(),
                spec.queue.job_retention,
                spec.queue.eviction_interval,
                shutdown,
            )
            .start(),
        );

        Ok(Self {
            service,
            queue,
            monitor,
            workers,
            background,
        })
    }

    /// Wait for workers and background tasks after the shutdown token fired
    pub async fn stop(self) {
        self.workers.join().await;
        for handle in self.background {
            if let Err(e) = handle.await {
                warn!("Background task exited abnormally: {}", e);
            }
        }
    }
}

fn install_metrics_exporter(bind_address: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid metrics address {}:{}", bind_address, port))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
