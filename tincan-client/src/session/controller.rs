use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use tincan_core::{CandidateSide, IceCandidate, LinkRole, RoomId, SignalMessage};

use crate::channel::SignalingSink;
use crate::error::{SessionFault, SignalingClosed, TrackError, TransportError};
use crate::session::peer_link::{LocalDescription, PeerLink};
use crate::transport::{
    LinkEvent, LinkEventKind, LinkSide, LocalTrack, MediaSource, TransportFactory,
};

/// Where a participant stands in the match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Lobby,
    Negotiating,
    Connected,
}

/// Local requests into the session actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// Announce another locally captured track. Triggers a renegotiation
    /// round on the sending link; rounds queue, they never interleave.
    AddLocalTrack(LocalTrack),
    /// Drop the current match and go back to waiting.
    HangUp,
}

/// The UI-facing boundary. Nothing else about negotiation internals crosses
/// it.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// Both media kinds arrived on the receiving link.
    async fn on_media_ready(&self, audio: Arc<dyn MediaSource>, video: Arc<dyn MediaSource>);

    /// The participant is back in the lobby waiting for a match.
    async fn on_lobby_entered(&self);
}

/// Cheap cloneable handle to a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// False when the actor is gone.
    pub async fn add_local_track(&self, track: LocalTrack) -> bool {
        self.commands
            .send(SessionCommand::AddLocalTrack(track))
            .await
            .is_ok()
    }

    pub async fn hang_up(&self) -> bool {
        self.commands.send(SessionCommand::HangUp).await.is_ok()
    }
}

/// Per-participant signaling state machine.
///
/// Runs as a single actor: inbound signaling, transport completions and
/// local commands are all serialized onto one queue, so no transition ever
/// races another for the same participant. Owns at most one match at a time
/// (the sending link it initiates and the receiving link it answers with)
/// and returns to the lobby when the match ends for any reason.
pub struct SessionController {
    sink: Arc<dyn SignalingSink>,
    signals: mpsc::UnboundedReceiver<SignalMessage>,
    commands: mpsc::Receiver<SessionCommand>,
    factory: Arc<dyn TransportFactory>,
    observer: Arc<dyn SessionObserver>,

    link_tx: mpsc::Sender<LinkEvent>,
    link_rx: mpsc::Receiver<LinkEvent>,

    local_tracks: Vec<LocalTrack>,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    room: Option<RoomId>,
    send_link: Option<PeerLink>,
    recv_link: Option<PeerLink>,

    /// Candidates routed to a link that does not exist yet; handed to its
    /// buffer the moment it opens. Each entry keeps the room it was sent
    /// for, so stragglers from a dead match are purged when a room binds.
    early_sending: Vec<(RoomId, IceCandidate)>,
    early_receiving: Vec<(RoomId, IceCandidate)>,

    /// A track change landed while an offer round was in flight; the next
    /// round starts when the current one settles.
    renegotiate_queued: bool,

    /// Bumped on every link open. Transport events stamped with an older
    /// value are completions of a link that has since been torn down and are
    /// discarded on receipt.
    generation: u64,
}

impl SessionController {
    pub fn new(
        sink: Arc<dyn SignalingSink>,
        signals: mpsc::UnboundedReceiver<SignalMessage>,
        factory: Arc<dyn TransportFactory>,
        observer: Arc<dyn SessionObserver>,
        local_tracks: Vec<LocalTrack>,
    ) -> (Self, SessionHandle) {
        let (command_tx, commands) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(SessionState::Lobby);
        let (link_tx, link_rx) = mpsc::channel(64);

        let controller = Self {
            sink,
            signals,
            commands,
            factory,
            observer,
            link_tx,
            link_rx,
            local_tracks,
            state: SessionState::Lobby,
            state_tx,
            room: None,
            send_link: None,
            recv_link: None,
            early_sending: Vec::new(),
            early_receiving: Vec::new(),
            renegotiate_queued: false,
            generation: 0,
        };
        let handle = SessionHandle {
            commands: command_tx,
            state: state_rx,
        };
        (controller, handle)
    }

    pub async fn run(mut self) {
        info!("session actor started");

        loop {
            let outcome = tokio::select! {
                msg = self.signals.recv() => match msg {
                    Some(msg) => self.handle_signal(msg).await,
                    None => {
                        warn!(fault = %SessionFault::ChannelDisconnected, "signaling inbox closed");
                        Err(SignalingClosed)
                    }
                },

                Some(event) = self.link_rx.recv() => self.handle_link_event(event).await,

                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::AddLocalTrack(track)) => {
                        self.handle_add_track(track).await
                    }
                    Some(SessionCommand::HangUp) => {
                        self.reset_to_lobby(true).await;
                        Ok(())
                    }
                    None => {
                        // Handle dropped; nobody is left to observe us.
                        self.reset_to_lobby(false).await;
                        break;
                    }
                },
            };

            if outcome.is_err() {
                self.reset_to_lobby(true).await;
                break;
            }
        }

        info!("session actor finished");
    }

    async fn handle_signal(&mut self, msg: SignalMessage) -> Result<(), SignalingClosed> {
        if !self.correlate(&msg) {
            return Ok(());
        }

        match msg {
            SignalMessage::RoomAssigned { room_id, role } => {
                self.handle_assigned(room_id, role).await
            }
            SignalMessage::Offer { room_id, sdp } => self.handle_offer(room_id, sdp).await,
            SignalMessage::Answer { sdp, .. } => self.handle_answer(sdp).await,
            SignalMessage::IceCandidate {
                room_id,
                side,
                candidate,
            } => {
                self.handle_candidate(room_id, side, candidate).await;
                Ok(())
            }
            SignalMessage::Lobby => {
                self.reset_to_lobby(true).await;
                Ok(())
            }
        }
    }

    /// A controller only accepts messages for the room it is bound to.
    /// While unbound, `RoomAssigned` and `Offer` are allowed in because they
    /// bind the room (the latter is the pure responder path), and candidates
    /// are allowed in because they may legitimately outrun the offer they
    /// belong to; anything else has no business here yet.
    fn correlate(&self, msg: &SignalMessage) -> bool {
        let Some(got) = msg.room_id() else {
            return true;
        };
        match self.room {
            Some(bound) if bound == got => true,
            bound @ Some(_) => {
                warn!(
                    fault = %SessionFault::MisroutedMessage { got, bound },
                    "dropping signal"
                );
                false
            }
            None => match msg {
                SignalMessage::RoomAssigned { .. }
                | SignalMessage::Offer { .. }
                | SignalMessage::IceCandidate { .. } => true,
                _ => {
                    warn!(
                        fault = %SessionFault::MisroutedMessage { got, bound: None },
                        "dropping signal for unbound room"
                    );
                    false
                }
            },
        }
    }

    async fn handle_assigned(
        &mut self,
        room_id: RoomId,
        role: LinkRole,
    ) -> Result<(), SignalingClosed> {
        if self.state != SessionState::Lobby {
            warn!(%room_id, "room assignment while already matched, dropping");
            return Ok(());
        }

        self.room = Some(room_id);
        self.drop_foreign_early(room_id);
        self.set_state(SessionState::Negotiating);

        match role {
            LinkRole::Initiator => {
                info!(%room_id, "matched as initiator");
                self.open_send_link().await
            }
            LinkRole::Responder => {
                // The peer initiates; our receiving link opens on its offer.
                info!(%room_id, "matched as responder, awaiting offer");
                Ok(())
            }
        }
    }

    async fn open_send_link(&mut self) -> Result<(), SignalingClosed> {
        self.generation += 1;
        let transport = match self
            .factory
            .open(LinkSide::Sending, self.generation, self.link_tx.clone())
            .await
        {
            Ok(transport) => transport,
            Err(e) => {
                self.fail_negotiation(e.into()).await;
                return Ok(());
            }
        };

        let mut link = PeerLink::new(LinkSide::Sending, self.generation, transport);
        for track in &self.local_tracks {
            if let Err(e) = link.add_local_track(track).await {
                link.close().await;
                self.fail_negotiation(e.into()).await;
                return Ok(());
            }
        }
        for (_, candidate) in std::mem::take(&mut self.early_sending) {
            link.add_candidate(candidate).await;
        }
        self.send_link = Some(link);

        if self.local_tracks.is_empty() {
            // Nothing attached means the transport will never signal
            // negotiation-needed; start the round ourselves.
            self.begin_offer_round().await?;
        }
        Ok(())
    }

    async fn handle_offer(&mut self, room_id: RoomId, sdp: String) -> Result<(), SignalingClosed> {
        if self.room.is_none() {
            self.room = Some(room_id);
            self.drop_foreign_early(room_id);
        }
        if self.state == SessionState::Lobby {
            self.set_state(SessionState::Negotiating);
        }

        if self.recv_link.is_none() {
            self.generation += 1;
            let transport = match self
                .factory
                .open(LinkSide::Receiving, self.generation, self.link_tx.clone())
                .await
            {
                Ok(transport) => transport,
                Err(e) => {
                    self.fail_negotiation(e.into()).await;
                    return Ok(());
                }
            };
            let mut link = PeerLink::new(LinkSide::Receiving, self.generation, transport);
            // Candidates that outran the offer move into the link's buffer
            // now, ahead of the remote description, so the flush below
            // applies them in original arrival order.
            for (_, candidate) in std::mem::take(&mut self.early_receiving) {
                link.add_candidate(candidate).await;
            }
            self.recv_link = Some(link);
        }

        let Some(link) = self.recv_link.as_mut() else {
            return Ok(());
        };
        match link.accept_offer(sdp).await {
            Ok(answer) => {
                info!(%room_id, "answering offer");
                self.emit(SignalMessage::Answer {
                    room_id,
                    sdp: answer,
                })
                .await
            }
            Err(e) => {
                self.fail_negotiation(e.into()).await;
                Ok(())
            }
        }
    }

    async fn handle_answer(&mut self, sdp: String) -> Result<(), SignalingClosed> {
        let Some(link) = self.send_link.as_mut() else {
            warn!("answer without a sending link, dropping");
            return Ok(());
        };
        if link.local_state() != LocalDescription::Offered {
            warn!("answer while no offer in flight, dropping");
            return Ok(());
        }

        match link.apply_answer(sdp).await {
            Ok(()) => {
                if self.state == SessionState::Negotiating {
                    info!("offer accepted, session connected");
                    self.set_state(SessionState::Connected);
                }
                if std::mem::take(&mut self.renegotiate_queued) {
                    self.begin_offer_round().await?;
                }
                Ok(())
            }
            Err(e) => {
                self.fail_negotiation(e.into()).await;
                Ok(())
            }
        }
    }

    /// Candidate routing. The wire tag names the link of the PARTICIPANT
    /// THAT EMITTED the candidate, so it cross-maps locally:
    ///
    ///   remote `sender`   -> local receiving link
    ///   remote `receiver` -> local sending link
    ///
    /// Candidates for a link that has not opened yet wait at the controller.
    async fn handle_candidate(
        &mut self,
        room_id: RoomId,
        side: CandidateSide,
        candidate: IceCandidate,
    ) {
        let target = match side {
            CandidateSide::Sender => LinkSide::Receiving,
            CandidateSide::Receiver => LinkSide::Sending,
        };
        let (link, early) = match target {
            LinkSide::Receiving => (self.recv_link.as_mut(), &mut self.early_receiving),
            LinkSide::Sending => (self.send_link.as_mut(), &mut self.early_sending),
        };
        match link {
            Some(link) => link.add_candidate(candidate).await,
            None => {
                debug!(%target, "queueing candidate for a link not yet open");
                early.push((room_id, candidate));
            }
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) -> Result<(), SignalingClosed> {
        let current = match event.side {
            LinkSide::Sending => self.send_link.as_ref().map(PeerLink::generation),
            LinkSide::Receiving => self.recv_link.as_ref().map(PeerLink::generation),
        };
        if current != Some(event.generation) {
            debug!(
                side = %event.side,
                generation = event.generation,
                "discarding event from a torn-down link"
            );
            return Ok(());
        }

        match event.kind {
            LinkEventKind::LocalCandidate(candidate) => {
                let Some(room_id) = self.room else {
                    return Ok(());
                };
                let side = match event.side {
                    LinkSide::Sending => CandidateSide::Sender,
                    LinkSide::Receiving => CandidateSide::Receiver,
                };
                self.emit(SignalMessage::IceCandidate {
                    room_id,
                    side,
                    candidate,
                })
                .await
            }
            LinkEventKind::RemoteTrack(track) => {
                self.handle_remote_track(event.side, track).await;
                Ok(())
            }
            LinkEventKind::NegotiationNeeded => {
                if event.side == LinkSide::Sending {
                    self.begin_offer_round().await
                } else {
                    warn!("negotiation-needed on the receiving link, ignoring");
                    Ok(())
                }
            }
            LinkEventKind::Closed => {
                warn!(side = %event.side, "transport reported closed");
                self.fail_negotiation(SessionFault::NegotiationFailed(TransportError::Closed))
                    .await;
                Ok(())
            }
        }
    }

    async fn handle_remote_track(&mut self, side: LinkSide, track: Arc<dyn MediaSource>) {
        if side != LinkSide::Receiving {
            warn!("track event on the sending link, ignoring");
            return;
        }
        let Some(link) = self.recv_link.as_mut() else {
            return;
        };
        match link.accept_track(track) {
            Ok(Some(pair)) => {
                info!("both media kinds assembled");
                self.observer.on_media_ready(pair.audio, pair.video).await;
            }
            Ok(None) => {}
            Err(e @ TrackError::TrackAfterComplete(_)) => {
                warn!(fault = %e, "ignoring extra track on a complete pair");
            }
            Err(e @ TrackError::DuplicateTrack(_)) => {
                self.fail_negotiation(e.into()).await;
            }
        }
    }

    async fn handle_add_track(&mut self, track: LocalTrack) -> Result<(), SignalingClosed> {
        self.local_tracks.push(track.clone());
        if let Some(link) = self.send_link.as_ref() {
            if let Err(e) = link.add_local_track(&track).await {
                self.fail_negotiation(e.into()).await;
            }
            // The transport answers with NegotiationNeeded, which begins or
            // queues the next offer round.
        }
        Ok(())
    }

    /// One offer round on the sending link. Strict alternation: while a
    /// round is in flight the request is queued and replayed after the
    /// answer settles.
    async fn begin_offer_round(&mut self) -> Result<(), SignalingClosed> {
        let Some(room_id) = self.room else {
            return Ok(());
        };
        let Some(link) = self.send_link.as_mut() else {
            return Ok(());
        };
        if link.local_state() == LocalDescription::Offered {
            debug!("offer round in flight, queueing renegotiation");
            self.renegotiate_queued = true;
            return Ok(());
        }

        match link.start_offer().await {
            Ok(sdp) => {
                info!(%room_id, "sending offer");
                self.emit(SignalMessage::Offer { room_id, sdp }).await
            }
            Err(e) => {
                self.fail_negotiation(e.into()).await;
                Ok(())
            }
        }
    }

    async fn emit(&self, msg: SignalMessage) -> Result<(), SignalingClosed> {
        self.sink.send(msg).await.map_err(|e| {
            warn!(fault = %SessionFault::ChannelDisconnected, "relay send failed");
            e
        })
    }

    /// A room just bound. Early candidates claimed by any other room are
    /// stragglers from a match that no longer exists and must not leak into
    /// this one.
    fn drop_foreign_early(&mut self, room_id: RoomId) {
        self.early_sending.retain(|(room, _)| *room == room_id);
        self.early_receiving.retain(|(room, _)| *room == room_id);
    }

    async fn fail_negotiation(&mut self, fault: SessionFault) {
        error!(fault = %fault, "match failed, returning to lobby");
        self.reset_to_lobby(true).await;
    }

    /// Tear down both links and every piece of buffered state. Idempotent:
    /// repeating it observes the same end state, and the observer hears
    /// about the lobby only on an actual transition.
    async fn reset_to_lobby(&mut self, notify: bool) {
        if let Some(link) = self.send_link.take() {
            link.close().await;
        }
        if let Some(link) = self.recv_link.take() {
            link.close().await;
        }
        self.early_sending.clear();
        self.early_receiving.clear();
        self.renegotiate_queued = false;
        self.room = None;

        let was_lobby = self.state == SessionState::Lobby;
        self.set_state(SessionState::Lobby);
        if notify && !was_lobby {
            self.observer.on_lobby_entered().await;
        }
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        let _ = self.state_tx.send(state);
    }
}
