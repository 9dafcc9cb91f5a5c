use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use tincan_client::{MediaSource, SessionObserver};
use tincan_core::TrackKind;

#[derive(Debug, PartialEq, Eq)]
pub enum ObserverEvent {
    MediaReady {
        audio_id: String,
        audio_kind: TrackKind,
        video_id: String,
        video_kind: TrackKind,
    },
    LobbyEntered,
}

/// Observer that forwards every callback into a channel the test can await.
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
            audio_kind: audio.kind(),
            video_id: video.id().to_string(),
            video_kind: video.kind(),
        });
    }

    async fn on_lobby_entered(&self) {
        let _ = self.tx.send(ObserverEvent::LobbyEntered);
    }
}
