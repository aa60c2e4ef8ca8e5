//! Gateway server — route table, health endpoint and listener

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router as HttpRouter};
use relaydesk_core::Router;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ws::Keepalive;
use crate::{webhook, ws};

pub const WEBHOOK_PATH: &str = "/telegram-webhook";

/// Build the HTTP application around a shared router
pub fn app(router: Arc<Router>) -> HttpRouter {
    app_with_keepalive(router, Keepalive::default())
}

pub fn app_with_keepalive(router: Arc<Router>, keepalive: Keepalive) -> HttpRouter {
    HttpRouter::new()
        .route("/", get(ws::ws_upgrade))
        .route("/ws", get(ws::ws_upgrade))
        .route(WEBHOOK_PATH, post(webhook::telegram_webhook))
        .route("/health", get(health))
        .layer(Extension(keepalive))
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

async fn health(State(router): State<Arc<Router>>) -> Json<Value> {
    let stats = router.stats();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connected_clients": stats.connected_clients,
        "queued_messages": stats.queued_messages,
        "pending_replies": stats.pending_replies,
    }))
}

pub struct GatewayServer {
    addr: String,
    router: Arc<Router>,
    keepalive: Keepalive,
}

impl GatewayServer {
    pub fn new(addr: impl Into<String>, router: Arc<Router>) -> Self {
        Self {
            addr: addr.into(),
            router,
            keepalive: Keepalive::default(),
        }
    }

    pub fn with_keepalive(mut self, keepalive: Keepalive) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr().context("Listener has no local address")?;
        info!(
            "Gateway listening on {} (webhook: {}, clients: ws://{}/?client_id=...)",
            local, WEBHOOK_PATH, local
        );

        axum::serve(listener, app_with_keepalive(self.router, self.keepalive))
            .with_graceful_shutdown(shutdown)
            .await
            .context("Gateway server failed")?;

        info!("Gateway stopped");
        Ok(())
    }
}
