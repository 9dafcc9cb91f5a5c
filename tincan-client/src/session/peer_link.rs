use std::sync::Arc;

use tracing::warn;

use tincan_core::IceCandidate;

use crate::error::{TrackError, TransportError};
use crate::session::candidate_buffer::CandidateBuffer;
use crate::session::track_assembler::{MediaPair, TrackAssembler};
use crate::transport::{LinkSide, LocalTrack, MediaSource, PeerTransport};

/// Local description progress for one link.
///
/// A sending link cycles `None → Offered → Stable`, re-entering `Offered`
/// once per renegotiation round; a receiving link moves to `Answered` and
/// re-enters it for each offer round from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalDescription {
    None,
    Offered,
    Answered,
    Stable,
}

/// One unidirectional-role peer connection and its negotiation lifecycle.
///
/// Owned exclusively by a session controller; born when negotiation starts
/// on its side of the match and closed with the match. Candidates flow
/// through the internal [`CandidateBuffer`], inbound tracks through the
/// receive-side [`TrackAssembler`].
pub struct PeerLink {
    side: LinkSide,
    generation: u64,
    transport: Arc<dyn PeerTransport>,
    local: LocalDescription,
    buffer: CandidateBuffer,
    assembler: Option<TrackAssembler>,
}

impl PeerLink {
    pub fn new(side: LinkSide, generation: u64, transport: Arc<dyn PeerTransport>) -> Self {
        let assembler = match side {
            LinkSide::Receiving => Some(TrackAssembler::new()),
            LinkSide::Sending => None,
        };
        Self {
            side,
            generation,
            transport,
            local: LocalDescription::None,
            buffer: CandidateBuffer::new(),
            assembler,
        }
    }

    pub fn side(&self) -> LinkSide {
        self.side
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn local_state(&self) -> LocalDescription {
        self.local
    }

    pub async fn add_local_track(&self, track: &LocalTrack) -> Result<(), TransportError> {
        self.transport.add_local_track(track).await
    }

    /// Create and apply a local offer. Legal from `None` (first round) and
    /// `Stable` (renegotiation); an in-flight round must finish first.
    pub async fn start_offer(&mut self) -> Result<String, TransportError> {
        if self.local == LocalDescription::Offered {
            return Err(TransportError::Negotiation(
                "offer round already in flight".to_string(),
            ));
        }
        let sdp = self.transport.create_offer().await?;
        self.local = LocalDescription::Offered;
        Ok(sdp)
    }

    /// Apply the remote answer to the in-flight offer, releasing any
    /// candidates buffered in the meantime.
    pub async fn apply_answer(&mut self, sdp: String) -> Result<(), TransportError> {
        if self.local != LocalDescription::Offered {
            return Err(TransportError::Negotiation(
                "answer without an offer in flight".to_string(),
            ));
        }
        self.transport.apply_remote_answer(sdp).await?;
        self.local = LocalDescription::Stable;
        self.remote_description_set().await;
        Ok(())
    }

    /// Apply a remote offer and produce the local answer for it. The buffer
    /// flushes between the two steps, so candidates that raced ahead of the
    /// offer are in place before the answer leaves.
    pub async fn accept_offer(&mut self, sdp: String) -> Result<String, TransportError> {
        self.transport.apply_remote_offer(sdp).await?;
        self.remote_description_set().await;
        let answer = self.transport.create_answer().await?;
        self.local = LocalDescription::Answered;
        Ok(answer)
    }

    /// Safe to call in any order relative to the descriptions: buffers until
    /// the remote description exists, and a transport-level rejection is
    /// logged, never surfaced to the caller.
    pub async fn add_candidate(&mut self, candidate: IceCandidate) {
        if let Some(ready) = self.buffer.push(candidate) {
            self.apply(ready).await;
        }
    }

    async fn remote_description_set(&mut self) {
        for candidate in self.buffer.mark_live() {
            self.apply(candidate).await;
        }
    }

    async fn apply(&mut self, candidate: IceCandidate) {
        if let Err(e) = self.transport.apply_candidate(candidate).await {
            warn!(side = %self.side, error = %e, "remote candidate rejected");
        }
    }

    /// Feed one inbound track to the assembler; `Some(pair)` once both kinds
    /// are present. Tracks on a sending link are an anomaly and are dropped.
    pub fn accept_track(
        &mut self,
        track: Arc<dyn MediaSource>,
    ) -> Result<Option<MediaPair>, TrackError> {
        match self.assembler.as_mut() {
            Some(assembler) => assembler.accept(track),
            None => {
                warn!(side = %self.side, "track delivered on the sending link, dropping");
                Ok(None)
            }
        }
    }

    pub async fn close(&self) {
        self.transport.close().await;
    }
}
