use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::error;

use tincan_core::{ParticipantId, SignalMessage};

use crate::switchboard::{SwitchCommand, Switchboard};

/// Shared relay state handed to every connection handler: the switchboard's
/// command queue plus a registry of who is currently connected.
#[derive(Clone)]
pub struct RelayService {
    commands: mpsc::Sender<SwitchCommand>,
    online: Arc<DashMap<ParticipantId, Instant>>,
}

impl RelayService {
    pub fn new(commands: mpsc::Sender<SwitchCommand>) -> Self {
        Self {
            commands,
            online: Arc::new(DashMap::new()),
        }
    }

    /// Spawn a fresh switchboard and the service fronting it.
    pub fn spawn() -> Self {
        Self::new(Switchboard::spawn())
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    pub async fn register(
        &self,
        id: ParticipantId,
        outbox: mpsc::UnboundedSender<SignalMessage>,
    ) {
        self.online.insert(id.clone(), Instant::now());
        if let Err(e) = self.commands.send(SwitchCommand::Join { id, outbox }).await {
            error!("switchboard is gone: {e}");
        }
    }

    pub async fn signal(&self, from: ParticipantId, msg: SignalMessage) {
        if let Err(e) = self.commands.send(SwitchCommand::Signal { from, msg }).await {
            error!("switchboard is gone: {e}");
        }
    }

    pub async fn unregister(&self, id: &ParticipantId) {
        self.online.remove(id);
        if let Err(e) = self
            .commands
            .send(SwitchCommand::Leave { id: id.clone() })
            .await
        {
            error!("switchboard is gone: {e}");
        }
    }
}
