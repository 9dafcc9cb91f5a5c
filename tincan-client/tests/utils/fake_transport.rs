use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};

use tincan_client::{
    LinkEvent, LinkEventKind, LinkSide, LocalTrack, MediaSource, PeerTransport, TransportError,
    TransportFactory,
};
use tincan_core::{IceCandidate, TrackKind};

/// Everything a controller drove into a fake transport, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOp {
    LocalTrack(String),
    OfferCreated(String),
    AnswerCreated(String),
    RemoteOffer(String),
    RemoteAnswer(String),
    Candidate(String),
    Closed,
}

/// Scripted peer transport: records operations, produces canned
/// descriptions, and lets tests inject link events as if gathering or track
/// delivery completed in the background.
pub struct FakeTransport {
    pub side: LinkSide,
    pub generation: u64,
    events: mpsc::Sender<LinkEvent>,
    ops: Mutex<Vec<FakeOp>>,
    offers: Mutex<u32>,
    fail_remote_offer: Arc<AtomicBool>,
}

impl FakeTransport {
    pub async fn ops(&self) -> Vec<FakeOp> {
        self.ops.lock().await.clone()
    }

    pub async fn applied_candidates(&self) -> Vec<String> {
        self.ops
            .lock()
            .await
            .iter()
            .filter_map(|op| match op {
                FakeOp::Candidate(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn remote_answers(&self) -> Vec<String> {
        self.ops
            .lock()
            .await
            .iter()
            .filter_map(|op| match op {
                FakeOp::RemoteAnswer(sdp) => Some(sdp.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn offers_created(&self) -> usize {
        self.ops
            .lock()
            .await
            .iter()
            .filter(|op| matches!(op, FakeOp::OfferCreated(_)))
            .count()
    }

    pub async fn local_tracks(&self) -> Vec<String> {
        self.ops
            .lock()
            .await
            .iter()
            .filter_map(|op| match op {
                FakeOp::LocalTrack(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn is_closed(&self) -> bool {
        self.ops.lock().await.iter().any(|op| op == &FakeOp::Closed)
    }

    /// Inject a link event stamped with this transport's side/generation, as
    /// the real transport's background callbacks would.
    pub async fn emit(&self, kind: LinkEventKind) {
        let _ = self
            .events
            .send(LinkEvent {
                side: self.side,
                generation: self.generation,
                kind,
            })
            .await;
    }

    pub async fn emit_track(&self, id: &str, kind: TrackKind) {
        self.emit(LinkEventKind::RemoteTrack(fake_track(id, kind)))
            .await;
    }

    async fn record(&self, op: FakeOp) {
        self.ops.lock().await.push(op);
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn add_local_track(&self, track: &LocalTrack) -> Result<(), TransportError> {
        self.record(FakeOp::LocalTrack(track.id.clone())).await;
        // The real transport signals renegotiation after a track change.
        self.emit(LinkEventKind::NegotiationNeeded).await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, TransportError> {
        let mut offers = self.offers.lock().await;
        *offers += 1;
        let sdp = format!("v=0 offer-{}-{}", self.side, *offers);
        self.record(FakeOp::OfferCreated(sdp.clone())).await;
        Ok(sdp)
    }

    async fn create_answer(&self) -> Result<String, TransportError> {
        let sdp = format!("v=0 answer-{}", self.side);
        self.record(FakeOp::AnswerCreated(sdp.clone())).await;
        Ok(sdp)
    }

    async fn apply_remote_offer(&self, sdp: String) -> Result<(), TransportError> {
        if self.fail_remote_offer.load(Ordering::SeqCst) {
            return Err(TransportError::Negotiation("scripted failure".to_string()));
        }
        self.record(FakeOp::RemoteOffer(sdp)).await;
        Ok(())
    }

    async fn apply_remote_answer(&self, sdp: String) -> Result<(), TransportError> {
        self.record(FakeOp::RemoteAnswer(sdp)).await;
        Ok(())
    }

    async fn apply_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.record(FakeOp::Candidate(candidate.candidate)).await;
        Ok(())
    }

    async fn close(&self) {
        self.record(FakeOp::Closed).await;
    }
}

/// Factory handing out fake transports and remembering every one it opened.
pub struct FakeFactory {
    opened: Mutex<Vec<Arc<FakeTransport>>>,
    fail_remote_offer: Arc<AtomicBool>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            fail_remote_offer: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent remote offer fail to apply.
    pub fn fail_remote_offers(&self) {
        self.fail_remote_offer.store(true, Ordering::SeqCst);
    }

    /// Latest transport opened for the given side.
    pub async fn transport(&self, side: LinkSide) -> Arc<FakeTransport> {
        self.opened
            .lock()
            .await
            .iter()
            .rev()
            .find(|t| t.side == side)
            .cloned()
            .expect("no transport opened for side")
    }

    pub async fn opened_count(&self) -> usize {
        self.opened.lock().await.len()
    }
}

#[async_trait]
impl TransportFactory for FakeFactory {
    async fn open(
        &self,
        side: LinkSide,
        generation: u64,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let transport = Arc::new(FakeTransport {
            side,
            generation,
            events,
            ops: Mutex::new(Vec::new()),
            offers: Mutex::new(0),
            fail_remote_offer: self.fail_remote_offer.clone(),
        });
        self.opened.lock().await.push(transport.clone());
        Ok(transport)
    }
}

struct FakeTrack {
    id: String,
    kind: TrackKind,
}

impl MediaSource for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn id(&self) -> &str {
        &self.id
    }
}

pub fn fake_track(id: &str, kind: TrackKind) -> Arc<dyn MediaSource> {
    Arc::new(FakeTrack {
        id: id.to_string(),
        kind,
    })
}
