use crate::error::SignalingClosed;
use async_trait::async_trait;
use tincan_core::SignalMessage;
use tokio::sync::mpsc;

/// Outbound half of the signaling channel toward the relay.
///
/// The inbound half is a plain `mpsc::UnboundedReceiver<SignalMessage>`
/// handed to the session controller at construction; the channel counts as
/// disconnected when either half goes away. No negotiation logic lives here:
/// the trait exists so the session core runs against an in-process fake as
/// easily as a real socket.
#[async_trait]
pub trait SignalingSink: Send + Sync {
    async fn send(&self, msg: SignalMessage) -> Result<(), SignalingClosed>;
}

/// Sink over an in-process queue. Tests and in-process relay wiring use this
/// on both ends of the channel.
pub struct LocalSink {
    tx: mpsc::UnboundedSender<SignalMessage>,
}

impl LocalSink {
    pub fn new(tx: mpsc::UnboundedSender<SignalMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SignalingSink for LocalSink {
    async fn send(&self, msg: SignalMessage) -> Result<(), SignalingClosed> {
        self.tx.send(msg).map_err(|_| SignalingClosed)
    }
}
