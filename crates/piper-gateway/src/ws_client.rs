use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use piper_session::{establish_connection, FrameTransport, IssuerHandle, MethodDispatcher};
use tokio::{net::TcpStream, task::JoinHandle};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

/// Connects to a gateway and returns the issuer surface plus the spawned
/// driver task; aborting or awaiting the task tears the connection down.
pub async fn connect_ws_issuer(
    url: &str,
    dispatcher: Arc<MethodDispatcher>,
) -> Result<(IssuerHandle, JoinHandle<Result<()>>)> {
    let (stream, _response) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect websocket at {url}"))?;
    let transport = TungsteniteTransport { stream };
    let (issuer, driver) = establish_connection(transport, dispatcher);
    let driver_task = tokio::spawn(driver.run());
    Ok((issuer, driver_task))
}

struct TungsteniteTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameTransport for TungsteniteTransport {
    async fn send_frame(&mut self, raw: String) -> Result<()> {
        self.stream
            .send(WsMessage::Text(raw.into()))
            .await
            .context("failed to send websocket frame")
    }

    async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            let Some(message) = self.stream.next().await else {
                return Ok(None);
            };
            match message.context("failed reading websocket message")? {
                WsMessage::Text(text) => return Ok(Some(text.to_string())),
                WsMessage::Close(_) => return Ok(None),
                _ => continue,
            }
        }
    }
}
