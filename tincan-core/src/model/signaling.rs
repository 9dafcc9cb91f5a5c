use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Role a participant plays for one peer link: the initiator creates the
/// offer, the responder answers it. A participant holds both roles at once
/// during a match: initiator of its sending link, responder on its
/// receiving link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkRole {
    Initiator,
    Responder,
}

/// Which link OF THE PARTICIPANT THAT EMITTED THE CANDIDATE produced it.
///
/// The consumer must cross-map: a candidate tagged `Sender` was gathered by
/// the remote party's sending link, so it belongs to the local RECEIVING
/// link, and vice versa. Routing a `Sender` candidate to the local sending
/// link silently drops it on the floor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSide {
    Sender,
    Receiver,
}

/// One gathered network candidate, carried verbatim between the two parties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
}

/// The signaling wire protocol. The relay forwards `Offer`, `Answer` and
/// `IceCandidate` between the two members of the named room without looking
/// inside; `RoomAssigned` and `Lobby` originate at the relay itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum SignalMessage {
    RoomAssigned {
        room_id: RoomId,
        role: LinkRole,
    },
    Offer {
        room_id: RoomId,
        sdp: String,
    },
    Answer {
        room_id: RoomId,
        sdp: String,
    },
    IceCandidate {
        room_id: RoomId,
        side: CandidateSide,
        candidate: IceCandidate,
    },
    Lobby,
}

impl SignalMessage {
    /// Room the message is addressed to, if it carries one. `Lobby` is a
    /// broadcast-style control message and has none.
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            SignalMessage::RoomAssigned { room_id, .. }
            | SignalMessage::Offer { room_id, .. }
            | SignalMessage::Answer { room_id, .. }
            | SignalMessage::IceCandidate { room_id, .. } => Some(*room_id),
            SignalMessage::Lobby => None,
        }
    }
}
