use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use piper_session::{establish_connection, FrameTransport, MethodDispatcher};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const GATEWAY_WS_PATH: &str = "/ws";

#[derive(Debug, Clone)]
/// Public struct `ServeConfig` for the piper gateway server.
pub struct ServeConfig {
    pub bind: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8790".to_string(),
        }
    }
}

struct GatewayState {
    dispatcher: Arc<MethodDispatcher>,
}

/// Router exposing the protocol over a `/ws` upgrade route.
pub fn build_gateway_router(dispatcher: Arc<MethodDispatcher>) -> Router {
    Router::new()
        .route(GATEWAY_WS_PATH, get(gateway_ws_upgrade_handler))
        .with_state(Arc::new(GatewayState { dispatcher }))
}

async fn gateway_ws_upgrade_handler(
    State(state): State<Arc<GatewayState>>,
    websocket: WebSocketUpgrade,
) -> Response {
    websocket
        .on_upgrade(move |socket| run_gateway_ws_connection(state, socket))
        .into_response()
}

async fn run_gateway_ws_connection(state: Arc<GatewayState>, socket: WebSocket) {
    let transport = AxumWsTransport { socket };
    let (_issuer, driver) = establish_connection(transport, Arc::clone(&state.dispatcher));
    if let Err(error) = driver.run().await {
        warn!("gateway websocket connection ended with error: {error:#}");
    }
}

/// Binds and serves until ctrl-c.
pub async fn run_gateway_server(config: ServeConfig, dispatcher: Arc<MethodDispatcher>) -> Result<()> {
    let router = build_gateway_router(dispatcher);
    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind gateway listener on {}", config.bind))?;
    info!("piper gateway listening on {}", config.bind);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("gateway server terminated")
}

struct AxumWsTransport {
    socket: WebSocket,
}

#[async_trait]
impl FrameTransport for AxumWsTransport {
    async fn send_frame(&mut self, raw: String) -> Result<()> {
        self.socket
            .send(WsMessage::Text(raw.into()))
            .await
            .context("failed to send websocket frame")
    }

    async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            let Some(message) = self.socket.recv().await else {
                return Ok(None);
            };
            match message.context("failed reading websocket message")? {
                WsMessage::Text(text) => return Ok(Some(text.to_string())),
                WsMessage::Close(_) => return Ok(None),
                WsMessage::Binary(_) | WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            }
        }
    }
}
