mod participant;
mod room;
mod signaling;
mod track;

pub use participant::ParticipantId;
pub use room::RoomId;
pub use signaling::{CandidateSide, IceCandidate, IceServerConfig, LinkRole, SignalMessage};
pub use track::TrackKind;
