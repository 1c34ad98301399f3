use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
/// One full-duplex, message-oriented connection: text frames in, text
/// frames out. `next_frame` returns `Ok(None)` when the peer has gone away
/// cleanly.
pub trait FrameTransport: Send {
    async fn send_frame(&mut self, raw: String) -> Result<()>;
    async fn next_frame(&mut self) -> Result<Option<String>>;
}

/// In-process transport half, used by tests and local demos.
#[derive(Debug)]
pub struct InMemoryTransport {
    sender: mpsc::UnboundedSender<String>,
    receiver: mpsc::UnboundedReceiver<String>,
}

/// Builds two crossed transport halves that speak to each other.
pub fn in_memory_transport_pair() -> (InMemoryTransport, InMemoryTransport) {
    let (left_sender, right_receiver) = mpsc::unbounded_channel();
    let (right_sender, left_receiver) = mpsc::unbounded_channel();
    (
        InMemoryTransport {
            sender: left_sender,
            receiver: left_receiver,
        },
        InMemoryTransport {
            sender: right_sender,
            receiver: right_receiver,
        },
    )
}

#[async_trait]
impl FrameTransport for InMemoryTransport {
    async fn send_frame(&mut self, raw: String) -> Result<()> {
        self.sender
            .send(raw)
            .map_err(|_| anyhow!("in-memory transport peer dropped"))
    }

    async fn next_frame(&mut self) -> Result<Option<String>> {
        Ok(self.receiver.recv().await)
    }
}
