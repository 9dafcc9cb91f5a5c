//! Shared pieces for relay integration tests: scripted transports, a
//! recording observer and the in-process sink that feeds a controller's
//! outbound signals straight into the switchboard.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;
use tracing::Level;

use tincan_client::{
    LinkEvent, LinkEventKind, LinkSide, LocalTrack, MediaSource, PeerTransport, SessionHandle,
    SessionObserver, SessionState, SignalingClosed, SignalingSink, TransportError,
    TransportFactory,
};
use tincan_core::{IceCandidate, SignalMessage, TrackKind};

use tincan_relay::SwitchCommand;

pub const WAIT: Duration = Duration::from_secs(2);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn wait_state(handle: &SessionHandle, want: SessionState) {
    let mut watch = handle.watch_state();
    timeout(WAIT, async {
        loop {
            if *watch.borrow_and_update() == want {
                return;
            }
            watch.changed().await.expect("state channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for state {want:?}"));
}

/// Controller-side sink that routes outbound signals into the switchboard,
/// tagged with the sending participant.
pub struct SwitchboardSink {
    pub from: tincan_core::ParticipantId,
    pub commands: mpsc::Sender<SwitchCommand>,
}

#[async_trait]
impl SignalingSink for SwitchboardSink {
    async fn send(&self, msg: SignalMessage) -> Result<(), SignalingClosed> {
        self.commands
            .send(SwitchCommand::Signal {
                from: self.from.clone(),
                msg,
            })
            .await
            .map_err(|_| SignalingClosed)
    }
}

/// Minimal scripted transport: canned descriptions, recorded candidates,
/// injectable track events.
pub struct FakeTransport {
    pub side: LinkSide,
    pub generation: u64,
    events: mpsc::Sender<LinkEvent>,
    candidates: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub async fn applied_candidates(&self) -> Vec<String> {
        self.candidates.lock().await.clone()
    }

    pub async fn emit_track(&self, id: &str, kind: TrackKind) {
        let _ = self
            .events
            .send(LinkEvent {
                side: self.side,
                generation: self.generation,
                kind: LinkEventKind::RemoteTrack(fake_track(id, kind)),
            })
            .await;
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn add_local_track(&self, _track: &LocalTrack) -> Result<(), TransportError> {
        let _ = self
            .events
            .send(LinkEvent {
                side: self.side,
                generation: self.generation,
                kind: LinkEventKind::NegotiationNeeded,
            })
            .await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, TransportError> {
        Ok(format!("v=0 offer-{}", self.side))
    }

    async fn create_answer(&self) -> Result<String, TransportError> {
        Ok(format!("v=0 answer-{}", self.side))
    }

    async fn apply_remote_offer(&self, _sdp: String) -> Result<(), TransportError> {
        Ok(())
    }

    async fn apply_remote_answer(&self, _sdp: String) -> Result<(), TransportError> {
        Ok(())
    }

    async fn apply_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.candidates.lock().await.push(candidate.candidate);
        Ok(())
    }

    async fn close(&self) {}
}

pub struct FakeFactory {
    opened: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
        }
    }

    pub async fn transport(&self, side: LinkSide) -> Arc<FakeTransport> {
        self.opened
            .lock()
            .await
            .iter()
            .rev()
            .find(|t| t.side == side)
            .cloned()
            .expect("no transport opened for side")
    }
}

#[async_trait]
impl TransportFactory for FakeFactory {
    async fn open(
        &self,
        side: LinkSide,
        generation: u64,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let transport = Arc::new(FakeTransport {
            side,
            generation,
            events,
            candidates: Mutex::new(Vec::new()),
        });
        self.opened.lock().await.push(transport.clone());
        Ok(transport)
    }
}

struct FakeTrack {
    id: String,
    kind: TrackKind,
}

impl MediaSource for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn id(&self) -> &str {
        &self.id
    }
}

pub fn fake_track(id: &str, kind: TrackKind) -> Arc<dyn MediaSource> {
    Arc::new(FakeTrack {
        id: id.to_string(),
        kind,
    })
}

#[derive(Debug, PartialEq, Eq)]
pub enum ObserverEvent {
    MediaReady {
        audio_id: String,
        video_id: String,
    },
    LobbyEntered,
}

pub struct RecordingObserver {
    tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl RecordingObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ObserverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SessionObserver for RecordingObserver {
    async fn on_media_ready(&self, audio: Arc<dyn MediaSource>, video: Arc<dyn MediaSource>) {
        let _ = self.tx.send(ObserverEvent::MediaReady {
            audio_id: audio.id().to_string(),
            video_id: video.id().to_string(),
        });
    }

    async fn on_lobby_entered(&self) {
        let _ = self.tx.send(ObserverEvent::LobbyEntered);
    }
}
