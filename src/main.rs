//! Berth - provisioning API for ephemeral SSH-accessible workloads

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use berth::api::{self, AppState};
use berth::cluster::KubeBackend;
use berth::config::{ExposureConfig, ExposureMode, Settings};
use berth::provision::Provisioner;

/// Berth - HTTP API that provisions single-pod workloads with SSH access
#[derive(Parser, Debug)]
#[command(name = "berth", version, about, long_about = None)]
struct Cli {
    /// Address to serve the API on
    #[arg(long, env = "BIND_ADDR", default_value = berth::DEFAULT_BIND_ADDR)]
    bind: String,

    /// Namespace provisioned objects land in
    #[arg(long, env = "NAMESPACE", default_value = "default")]
    namespace: String,

    /// Prefix for derived object names
    #[arg(long, env = "NAME_PREFIX", default_value = berth::DEFAULT_NAME_PREFIX)]
    name_prefix: String,

    /// Service exposure mode (node-port or load-balancer)
    ///
    /// Unrecognized values fall back to node-port with a warning.
    #[arg(long, env = "EXPOSURE_MODE", default_value = "node-port")]
    exposure_mode: String,

    /// Pinned NodePort for the HTTP service port
    #[arg(long, env = "HTTP_NODE_PORT", default_value_t = berth::DEFAULT_HTTP_NODE_PORT)]
    http_node_port: u16,

    /// Pinned NodePort for the SSH service port
    #[arg(long, env = "SSH_NODE_PORT", default_value_t = berth::DEFAULT_SSH_NODE_PORT)]
    ssh_node_port: u16,

    /// Path to a kubeconfig file (defaults to in-cluster / environment
    /// inference)
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,berth=debug,kube=info,hyper=warn")),
        )
        .init();

    let cli = Cli::parse();

    let mode = ExposureMode::parse_lenient(&cli.exposure_mode);
    let settings = Settings {
        namespace: cli.namespace,
        name_prefix: cli.name_prefix,
        exposure: ExposureConfig {
            mode,
            http_node_port: Some(cli.http_node_port),
            ssh_node_port: Some(cli.ssh_node_port),
        },
    };

    let backend = KubeBackend::connect(cli.kubeconfig.as_deref()).await?;
    let provisioner = Arc::new(Provisioner::new(Arc::new(backend), settings));
    let app = api::router(AppState { provisioner });

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    info!(addr = %cli.bind, exposure = %mode, "berth API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!("shutdown signal received");
}
