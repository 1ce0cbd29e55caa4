//! # Registry Operator
//!
//! Kubernetes controller that manages the lifecycle of `DockerRegistry`
//! resources.
//!
//! Only one `DockerRegistry` per cluster is served; redundant instances are
//! marked with a Warning and left alone. When the served instance is deleted,
//! the controller tears down the rendered registry bundle (secrets first) and
//! only then releases the object by removing its finalizer.
//!
//! ## Configuration
//!
//! See [`registry_operator::config::ControllerConfig`] for the environment
//! variables read at startup.

use anyhow::{Context as _, Result};
use futures::StreamExt;
use kube::{Api, Client};
use kube_runtime::{controller::Config as ControllerRuntimeConfig, watcher, Controller};
use registry_operator::{
    chart::ManifestChart,
    config::ControllerConfig,
    controller::{error_policy, reconcile, Context},
    observability::{logging::init_logging, metrics},
    server::{start_server, ServerState},
    state::StateReconciler,
    store::KubeRegistryStore,
    DockerRegistry,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23 needs a process-wide provider before the client is built
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider was already installed");
    }

    let config = ControllerConfig::from_env();
    init_logging(config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Registry Operator"
    );
    debug!(?config, "Loaded controller configuration");

    metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_port = config.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let manifest = tokio::fs::read_to_string(&config.chart_manifest_path)
        .await
        .with_context(|| {
            format!(
                "Failed to read registry bundle from {}",
                config.chart_manifest_path.display()
            )
        })?;
    let chart = ManifestChart::new(client.clone(), config.chart_namespace.clone(), &manifest)
        .context("Failed to load registry bundle")?;
    info!(
        namespace = %config.chart_namespace,
        path = %config.chart_manifest_path.display(),
        "Loaded registry bundle"
    );

    let store = Arc::new(KubeRegistryStore::new(client.clone()));
    let reconciler = StateReconciler::new(Arc::new(chart), store);
    let ctx = Arc::new(Context::new(reconciler, &config));

    let registries: Api<DockerRegistry> = Api::all(client);

    server_state.mark_ready();

    Controller::new(registries, watcher::Config::default())
        .with_config(
            ControllerRuntimeConfig::default().concurrency(config.max_concurrent_reconciliations),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| {
            match result {
                Ok((obj, _)) => debug!(resource = %obj.name, "reconciled"),
                Err(e) => warn!("controller stream error: {}", e),
            }
            std::future::ready(())
        })
        .await;

    info!("Controller stopped");

    Ok(())
}
