mod candidate_buffer;
mod controller;
mod peer_link;
mod track_assembler;

pub use candidate_buffer::CandidateBuffer;
pub use controller::{
    SessionCommand, SessionController, SessionHandle, SessionObserver, SessionState,
};
pub use peer_link::{LocalDescription, PeerLink};
pub use track_assembler::{MediaPair, TrackAssembler};
