//! Client-side session core for tincan.
//!
//! A [`session::SessionController`] takes one participant from the lobby
//! through offer/answer negotiation to a connected two-way call. Everything
//! I/O-shaped is injected: signaling goes through the [`channel::SignalingSink`]
//! boundary, peer connections come from a [`transport::TransportFactory`].
//! The production transport in [`transport::native`] is backed by the
//! `webrtc` crate; tests run the same controller against fakes.

pub mod channel;
pub mod error;
pub mod session;
pub mod transport;

pub use channel::{LocalSink, SignalingSink};
pub use error::{SessionFault, SignalingClosed, TrackError, TransportError};
pub use session::{
    CandidateBuffer, LocalDescription, MediaPair, PeerLink, SessionCommand, SessionController,
    SessionHandle, SessionObserver, SessionState, TrackAssembler,
};
pub use transport::{
    LinkEvent, LinkEventKind, LinkSide, LocalTrack, MediaSource, PeerTransport, TransportFactory,
};
