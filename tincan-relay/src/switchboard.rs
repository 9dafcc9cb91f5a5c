use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tincan_core::{LinkRole, ParticipantId, RoomId, SignalMessage};

/// Commands into the switchboard actor. Connection handlers translate
/// socket lifecycle into `Join`/`Leave` and inbound frames into `Signal`.
#[derive(Debug)]
pub enum SwitchCommand {
    Join {
        id: ParticipantId,
        outbox: mpsc::UnboundedSender<SignalMessage>,
    },
    Signal {
        from: ParticipantId,
        msg: SignalMessage,
    },
    Leave {
        id: ParticipantId,
    },
}

struct MatchPair {
    a: ParticipantId,
    b: ParticipantId,
}

impl MatchPair {
    fn partner_of(&self, id: &ParticipantId) -> Option<&ParticipantId> {
        if &self.a == id {
            Some(&self.b)
        } else if &self.b == id {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// Matchmaker and message router in one actor.
///
/// Owns the waiting queue, the room table and every participant outbox;
/// nothing else in the process touches pairing state. Pairing policy is
/// FIFO: the two longest-waiting live participants get a fresh room, and
/// both are told to initiate: each side offers on its own sending link and
/// answers the other's offer, with this actor crossing the messages between
/// them.
pub struct Switchboard {
    commands: mpsc::Receiver<SwitchCommand>,
    outboxes: HashMap<ParticipantId, mpsc::UnboundedSender<SignalMessage>>,
    waiting: VecDeque<ParticipantId>,
    rooms: HashMap<RoomId, MatchPair>,
    membership: HashMap<ParticipantId, RoomId>,
}

impl Switchboard {
    pub fn new(commands: mpsc::Receiver<SwitchCommand>) -> Self {
        Self {
            commands,
            outboxes: HashMap::new(),
            waiting: VecDeque::new(),
            rooms: HashMap::new(),
            membership: HashMap::new(),
        }
    }

    /// Spawn a switchboard and hand back its command queue.
    pub fn spawn() -> mpsc::Sender<SwitchCommand> {
        let (tx, rx) = mpsc::channel(128);
        tokio::spawn(Self::new(rx).run());
        tx
    }

    pub async fn run(mut self) {
        info!("switchboard started");

        while let Some(cmd) = self.commands.recv().await {
            match cmd {
                SwitchCommand::Join { id, outbox } => self.handle_join(id, outbox),
                SwitchCommand::Signal { from, msg } => self.handle_signal(from, msg),
                SwitchCommand::Leave { id } => self.handle_leave(&id),
            }
        }

        info!("switchboard finished");
    }

    fn handle_join(&mut self, id: ParticipantId, outbox: mpsc::UnboundedSender<SignalMessage>) {
        if self.membership.contains_key(&id) {
            warn!(%id, "participant rejoined mid-match, releasing the old match");
            self.handle_leave(&id);
        }
        if self.outboxes.insert(id.clone(), outbox).is_some() {
            warn!(%id, "replacing a stale connection");
            self.waiting.retain(|w| w != &id);
        }

        info!(%id, waiting = self.waiting.len() + 1, "participant waiting for a match");
        self.waiting.push_back(id);
        self.try_match();
    }

    fn try_match(&mut self) {
        loop {
            let Some(a) = self.next_waiting() else { return };
            let Some(b) = self.next_waiting() else {
                self.waiting.push_front(a);
                return;
            };

            let room_id = RoomId::new();
            info!(%room_id, %a, %b, "paired");
            self.rooms.insert(
                room_id,
                MatchPair {
                    a: a.clone(),
                    b: b.clone(),
                },
            );
            self.membership.insert(a.clone(), room_id);
            self.membership.insert(b.clone(), room_id);

            // Both sides initiate: each offers on its sending link and
            // answers the other's offer on its receiving link.
            for id in [a, b] {
                self.forward(
                    &id,
                    SignalMessage::RoomAssigned {
                        room_id,
                        role: LinkRole::Initiator,
                    },
                );
            }
        }
    }

    /// Pop the next waiting participant whose connection is still alive.
    fn next_waiting(&mut self) -> Option<ParticipantId> {
        while let Some(id) = self.waiting.pop_front() {
            let alive = self
                .outboxes
                .get(&id)
                .is_some_and(|outbox| !outbox.is_closed());
            if alive {
                return Some(id);
            }
            debug!(%id, "skipping dead entry in the waiting queue");
        }
        None
    }

    fn handle_signal(&mut self, from: ParticipantId, msg: SignalMessage) {
        let Some(room_id) = msg.room_id() else {
            warn!(%from, "control message from a participant, dropping");
            return;
        };
        if matches!(msg, SignalMessage::RoomAssigned { .. }) {
            warn!(%from, %room_id, "participant tried to assign a room, dropping");
            return;
        }

        let Some(pair) = self.rooms.get(&room_id) else {
            warn!(%from, %room_id, "signal for an unknown room, dropping");
            return;
        };
        let Some(to) = pair.partner_of(&from) else {
            warn!(%from, %room_id, "signal from a non-member, dropping");
            return;
        };

        self.forward(to, msg);
    }

    fn handle_leave(&mut self, id: &ParticipantId) {
        self.outboxes.remove(id);
        self.waiting.retain(|w| w != id);

        let Some(room_id) = self.membership.remove(id) else {
            return;
        };
        let Some(pair) = self.rooms.remove(&room_id) else {
            return;
        };
        let partner = if &pair.a == id { pair.b } else { pair.a };
        self.membership.remove(&partner);

        info!(%room_id, %id, %partner, "match ended, releasing the partner to the lobby");
        if self.outboxes.contains_key(&partner) {
            self.forward(&partner, SignalMessage::Lobby);
            self.waiting.push_back(partner);
            self.try_match();
        }
    }

    fn forward(&self, to: &ParticipantId, msg: SignalMessage) {
        let Some(outbox) = self.outboxes.get(to) else {
            warn!(%to, "no connection for recipient, dropping signal");
            return;
        };
        if outbox.send(msg).is_err() {
            warn!(%to, "recipient connection is gone, dropping signal");
        }
    }
}
