use crate::error::TransportError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tincan_core::{IceCandidate, TrackKind};
use tokio::sync::mpsc;

pub mod native;

/// Which of a session's two links a transport or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    Sending,
    Receiving,
}

impl fmt::Display for LinkSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkSide::Sending => "sending",
            LinkSide::Receiving => "receiving",
        })
    }
}

/// A remote media track as seen by the session core. Concrete transports
/// wrap their native track handle; tests fabricate these directly.
pub trait MediaSource: Send + Sync {
    fn kind(&self) -> TrackKind;
    fn id(&self) -> &str;
}

/// Descriptor for a locally captured track announced on the sending link.
/// Sample delivery stays between the capture layer and the concrete
/// transport; the session core only negotiates the track's existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: String,
    pub kind: TrackKind,
}

impl LocalTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Asynchronous completion delivered back into the controller's serialized
/// queue. `generation` stamps which incarnation of the link emitted it;
/// events stamped by a link that has since been closed and replaced are
/// discarded on receipt.
pub struct LinkEvent {
    pub side: LinkSide,
    pub generation: u64,
    pub kind: LinkEventKind,
}

pub enum LinkEventKind {
    /// Local gathering produced a candidate to forward to the peer.
    LocalCandidate(IceCandidate),
    /// A remote track arrived (receiving side).
    RemoteTrack(Arc<dyn MediaSource>),
    /// The set of local tracks changed; an offer round is due.
    NegotiationNeeded,
    /// The underlying connection failed or was closed remotely.
    Closed,
}

impl fmt::Debug for LinkEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEventKind::LocalCandidate(c) => f.debug_tuple("LocalCandidate").field(c).finish(),
            LinkEventKind::RemoteTrack(t) => f
                .debug_struct("RemoteTrack")
                .field("kind", &t.kind())
                .field("id", &t.id())
                .finish(),
            LinkEventKind::NegotiationNeeded => f.write_str("NegotiationNeeded"),
            LinkEventKind::Closed => f.write_str("Closed"),
        }
    }
}

/// One underlying peer connection, reduced to the operations the session
/// core drives. Description-producing calls also apply the result as the
/// local description before returning.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_local_track(&self, track: &LocalTrack) -> Result<(), TransportError>;

    /// Create an offer and apply it as the local description.
    async fn create_offer(&self) -> Result<String, TransportError>;

    /// Create an answer to the current remote offer and apply it locally.
    async fn create_answer(&self) -> Result<String, TransportError>;

    async fn apply_remote_offer(&self, sdp: String) -> Result<(), TransportError>;

    async fn apply_remote_answer(&self, sdp: String) -> Result<(), TransportError>;

    async fn apply_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    async fn close(&self);
}

/// Source of peer transports, injected into the session controller so the
/// core can be exercised against fakes.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        side: LinkSide,
        generation: u64,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
