use thiserror::Error;
use tincan_core::{RoomId, TrackKind};

/// Failures surfaced by a peer transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A description could not be created or applied.
    #[error("description negotiation failed: {0}")]
    Negotiation(String),

    /// A remote candidate was rejected by the underlying connection.
    #[error("candidate rejected: {0}")]
    Candidate(String),

    /// The underlying connection is gone.
    #[error("transport closed")]
    Closed,
}

/// Anomalies in remote track delivery from a misbehaving peer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("second {0} track on the same link")]
    DuplicateTrack(TrackKind),

    #[error("{0} track arrived after the pair was complete")]
    TrackAfterComplete(TrackKind),
}

/// The signaling channel to the relay is gone.
#[derive(Debug, Error)]
#[error("signaling channel closed")]
pub struct SignalingClosed;

/// Session-scoped faults. None of these are process-fatal: each either drops
/// the offending message or tears the current match down and returns the
/// participant to the lobby to await a new pairing.
#[derive(Debug, Error)]
pub enum SessionFault {
    #[error("message for room {got} while bound to {bound:?}")]
    MisroutedMessage { got: RoomId, bound: Option<RoomId> },

    #[error("negotiation failed: {0}")]
    NegotiationFailed(#[from] TransportError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error("relay connection lost")]
    ChannelDisconnected,
}
