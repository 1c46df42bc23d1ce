//! HTTP server: static page, health endpoint, WebSocket bridge sessions.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use testwire_bridge::{BridgeError, BridgeResult, RunnerConfig, Session, SessionTransport};

use crate::config::WebConfig;

struct ServerState {
    runner: RunnerConfig,
}

/// The web frontend. Every `/ws` upgrade becomes one independent bridge
/// session against a freshly spawned runner; everything else is static
/// content from the configured directory.
pub struct WebServer {
    state: Arc<ServerState>,
    static_dir: PathBuf,
    allow_any_origin: bool,
}

impl WebServer {
    pub fn new(config: &WebConfig) -> Self {
        Self {
            state: Arc::new(ServerState {
                runner: config.runner_config(),
            }),
            static_dir: config.static_dir.clone(),
            allow_any_origin: config.allow_any_origin,
        }
    }

    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/ws", get(websocket_handler))
            .route("/api/health", get(health_handler))
            .fallback_service(ServeDir::new(&self.static_dir))
            .with_state(self.state.clone());

        if self.allow_any_origin {
            router = router.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any));
        }

        router.layer(TraceLayer::new_for_http())
    }

    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("listening on http://{addr}");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "testwire-web",
    }))
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let session = Session::new(WsTransport::new(socket), state.runner.clone());
        let id = session.id();
        info!(session = %id, "websocket session opened");
        match session.run().await {
            Ok(()) => info!(session = %id, "websocket session finished"),
            Err(BridgeError::TransportClosed) => {
                debug!(session = %id, "client disconnected before completion");
            }
            Err(e) => warn!(session = %id, "session failed: {e}"),
        }
    })
}

/// [`SessionTransport`] over an axum WebSocket.
///
/// Text and binary frames carry client input; ping/pong is handled below this
/// layer and skipped here. Output lines go out as text frames, with invalid
/// UTF-8 replaced rather than dropped.
struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl SessionTransport for WsTransport {
    async fn receive(&mut self) -> BridgeResult<Bytes> {
        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => return Ok(Bytes::from(text.into_bytes())),
                Some(Ok(Message::Binary(data))) => return Ok(Bytes::from(data)),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(BridgeError::TransportClosed),
                Some(Err(e)) => {
                    debug!("websocket receive failed: {e}");
                    return Err(BridgeError::TransportClosed);
                }
            }
        }
    }

    async fn send(&mut self, frame: &[u8]) -> BridgeResult<()> {
        let text = String::from_utf8_lossy(frame).into_owned();
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|_| BridgeError::TransportClosed)
    }
}
