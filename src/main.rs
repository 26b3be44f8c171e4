//! x402 Operator - payment gating for Kubernetes Ingress resources

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use x402_operator::controller::{error_policy, ingress_to_routes, reconcile, Context};
use x402_operator::crd::X402Route;
use x402_operator::gateway::GatewayServer;
use x402_operator::leader::LeaderElector;
use x402_operator::metrics;
use x402_operator::store::RouteStore;

/// x402 operator - payment gating for Kubernetes Ingress resources
#[derive(Parser, Debug)]
#[command(name = "x402-operator", version, about, long_about = None)]
struct Cli {
    /// Generate the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// The address the metrics endpoint binds to
    #[arg(long, default_value = "0.0.0.0:8080")]
    metrics_bind_address: SocketAddr,

    /// The address the probe endpoint binds to
    #[arg(long, default_value = "0.0.0.0:8081")]
    health_probe_bind_address: SocketAddr,

    /// The address the gateway proxy binds to
    #[arg(long, default_value = "0.0.0.0:8402")]
    gateway_bind_address: SocketAddr,

    /// Enable leader election for the controller
    #[arg(long)]
    leader_elect: bool,

    /// Namespace where the operator runs
    #[arg(long, env = "POD_NAMESPACE", default_value = "x402-system")]
    operator_namespace: String,

    /// Service name of the operator
    #[arg(long, env = "OPERATOR_SERVICE_NAME", default_value = "x402-operator")]
    operator_service_name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        // Generate CRD YAML
        let crd = serde_yaml::to_string(&X402Route::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    metrics::register_metrics();

    tracing::info!("x402 operator starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    // Shared route store: written by the reconciler, read by the gateway.
    let store = Arc::new(RouteStore::new());

    // Shutdown signal fanned out to every server.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    // Leader election gates the controller only; the gateway serves on every
    // replica.
    if cli.leader_elect {
        let identity = std::env::var("POD_NAME")
            .unwrap_or_else(|_| format!("x402-operator-{}", std::process::id()));
        let elector = Arc::new(LeaderElector::new(
            client.clone(),
            cli.operator_namespace.clone(),
            identity,
        ));
        let guard = elector.acquire().await;
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            guard.lost().await;
            tracing::error!("leadership lost, shutting down for a clean restart");
            let _ = shutdown_tx.send(true);
        });
    }

    let ctx = Arc::new(Context::new(
        client.clone(),
        Arc::clone(&store),
        cli.operator_namespace.clone(),
        cli.operator_service_name.clone(),
    ));

    let routes: Api<X402Route> = Api::all(client.clone());
    let ingresses: Api<Ingress> = Api::all(client);

    tracing::info!(
        metrics = %cli.metrics_bind_address,
        probes = %cli.health_probe_bind_address,
        gateway = %cli.gateway_bind_address,
        operator_namespace = %cli.operator_namespace,
        operator_service_name = %cli.operator_service_name,
        "starting manager"
    );

    // The controller watches both X402Routes and the Ingresses they manage.
    let watch_store = Arc::clone(&store);
    let route_controller = Controller::new(routes, WatcherConfig::default())
        .watches(ingresses, WatcherConfig::default(), move |ingress| {
            ingress_to_routes(&watch_store, &ingress)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "reconciliation error");
                }
            }
        });

    let gateway = GatewayServer::new(cli.gateway_bind_address, Arc::clone(&store))
        .run(shutdown_signal(shutdown_rx.clone()));
    let metrics_server = serve_metrics(cli.metrics_bind_address, shutdown_signal(shutdown_rx.clone()));
    let probe_server = serve_probes(cli.health_probe_bind_address, shutdown_signal(shutdown_rx));

    tokio::select! {
        _ = route_controller => {
            tracing::info!("controller stopped");
        }
        result = gateway => {
            result?;
        }
        result = metrics_server => {
            result?;
        }
        result = probe_server => {
            result?;
        }
    }

    tracing::info!("x402 operator shutting down");
    Ok(())
}

/// Future that resolves once the shutdown signal fires
fn shutdown_signal(
    mut rx: tokio::sync::watch::Receiver<bool>,
) -> impl std::future::Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.wait_for(|stopping| *stopping).await;
    }
}

/// Serve the Prometheus registry on `/metrics`
async fn serve_metrics(
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = Router::new().route("/metrics", get(|| async { metrics::gather() }));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind metrics listener {}: {}", addr, e))?;
    tracing::info!(addr = %addr, "metrics endpoint listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("Metrics server failed: {}", e))
}

/// Serve liveness and readiness probes
async fn serve_probes(
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind probe listener {}: {}", addr, e))?;
    tracing::info!(addr = %addr, "health probes listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("Probe server failed: {}", e))
}
