//! Gateway HTTP server
//!
//! Serves all paths through the payment pipeline, plus `/healthz` for the
//! Ingress default-backend health checks. Shuts down gracefully when the
//! provided signal fires, with a bounded drain.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::handler::{self, GatewayState};
use crate::store::RouteStore;
use crate::{Error, Result};

/// How long in-flight requests get to finish after shutdown is signalled
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// The gateway HTTP server
pub struct GatewayServer {
    addr: SocketAddr,
    state: Arc<GatewayState>,
}

impl GatewayServer {
    /// Create a new gateway server reading from the given route store
    pub fn new(addr: SocketAddr, store: Arc<RouteStore>) -> Self {
        Self {
            addr,
            state: Arc::new(GatewayState::new(store)),
        }
    }

    /// Build the router: `/healthz` plus the payment pipeline for everything
    /// else
    fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(|| async { "ok" }))
            .fallback(handler::handle)
            .with_state(Arc::clone(&self.state))
    }

    /// Serve until the shutdown signal fires, then drain for up to 15 s.
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| Error::internal(format!("bind gateway listener {}: {e}", self.addr)))?;
        info!(addr = %self.addr, "starting x402 gateway");

        let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
        let serve = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutting down gateway server");
            let _ = drain_tx.send(());
        });

        let serve = std::future::IntoFuture::into_future(serve);
        tokio::pin!(serve);
        let result = tokio::select! {
            result = &mut serve => {
                result.map_err(|e| Error::internal(format!("gateway server failed: {e}")))
            }
            _ = async {
                let _ = drain_rx.await;
                tokio::time::sleep(DRAIN_TIMEOUT).await;
            } => {
                warn!(timeout = ?DRAIN_TIMEOUT, "gateway drain deadline exceeded, aborting open connections");
                Ok(())
            }
        };

        info!("gateway server stopped");
        result
    }
}
