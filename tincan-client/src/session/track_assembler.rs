use crate::error::TrackError;
use crate::transport::MediaSource;
use std::fmt;
use std::sync::Arc;
use tincan_core::TrackKind;

/// The assembled audio/video pair. Exposed atomically, so downstream
/// consumers never observe a lone track.
#[derive(Clone)]
pub struct MediaPair {
    pub audio: Arc<dyn MediaSource>,
    pub video: Arc<dyn MediaSource>,
}

impl fmt::Debug for MediaPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPair")
            .field("audio", &(self.audio.kind(), self.audio.id()))
            .field("video", &(self.video.kind(), self.video.id()))
            .finish()
    }
}

/// Collects inbound tracks for one receiving link until both kinds are
/// present. Completion is count-based: the pair is ready the moment the
/// second distinct kind arrives, regardless of arrival order or the delay
/// between the two. Never on a timer.
#[derive(Default)]
pub struct TrackAssembler {
    audio: Option<Arc<dyn MediaSource>>,
    video: Option<Arc<dyn MediaSource>>,
    complete: bool,
}

impl TrackAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Ok(Some(pair))` exactly once per assembler lifetime, when
    /// the second kind lands. After completion the assembler is inert.
    pub fn accept(
        &mut self,
        track: Arc<dyn MediaSource>,
    ) -> Result<Option<MediaPair>, TrackError> {
        let kind = track.kind();
        if self.complete {
            return Err(TrackError::TrackAfterComplete(kind));
        }

        let slot = match kind {
            TrackKind::Audio => &mut self.audio,
            TrackKind::Video => &mut self.video,
        };
        if slot.is_some() {
            return Err(TrackError::DuplicateTrack(kind));
        }
        *slot = Some(track);

        match (&self.audio, &self.video) {
            (Some(audio), Some(video)) => {
                self.complete = true;
                Ok(Some(MediaPair {
                    audio: audio.clone(),
                    video: video.clone(),
                }))
            }
            _ => Ok(None),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}
