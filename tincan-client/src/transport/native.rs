//! Production transport over the `webrtc` crate.
//!
//! One [`WebRtcTransport`] wraps one `RTCPeerConnection`. Connection
//! callbacks are funneled into the owning controller's event queue as
//! [`LinkEvent`]s; nothing here calls back into session state directly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use tincan_core::{IceCandidate, IceServerConfig, TrackKind};

use crate::error::TransportError;
use crate::transport::{
    LinkEvent, LinkEventKind, LinkSide, LocalTrack, MediaSource, PeerTransport, TransportFactory,
};

/// Remote track handle crossing the transport seam. Holding it keeps the
/// RTP pipe alive; the raw `TrackRemote` stays reachable through
/// [`WebRtcFactory::remote_track`] for the playout layer.
pub struct RemoteSample {
    id: String,
    kind: TrackKind,
    _track: Arc<TrackRemote>,
}

impl MediaSource for RemoteSample {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Default)]
struct MediaRegistry {
    writers: HashMap<String, Arc<TrackLocalStaticSample>>,
    remotes: HashMap<String, Arc<TrackRemote>>,
}

/// Builds peer connections configured against a fixed ICE server set and
/// keeps the media registry the capture/playout layers use to reach the
/// concrete track handles by id.
pub struct WebRtcFactory {
    ice_servers: Vec<IceServerConfig>,
    registry: Arc<Mutex<MediaRegistry>>,
}

impl WebRtcFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            ice_servers,
            registry: Arc::new(Mutex::new(MediaRegistry::default())),
        }
    }

    /// Writable handle for a local track previously announced through
    /// [`PeerTransport::add_local_track`]. The capture layer pushes encoded
    /// samples through this; the session core never does.
    pub async fn sample_writer(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        self.registry.lock().await.writers.get(track_id).cloned()
    }

    /// Raw handle for a remote track that was surfaced as a
    /// [`MediaSource`] with the same id.
    pub async fn remote_track(&self, track_id: &str) -> Option<Arc<TrackRemote>> {
        self.registry.lock().await.remotes.get(track_id).cloned()
    }

    fn rtc_config(&self) -> RTCConfiguration {
        let ice_servers = self
            .ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
            })
            .collect();
        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransportFactory for WebRtcFactory {
    async fn open(
        &self,
        side: LinkSide,
        generation: u64,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(self.rtc_config())
                .await
                .map_err(|e| TransportError::Negotiation(e.to_string()))?,
        );

        let state_tx = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            Box::pin(async move {
                debug!(side = %side, state = ?s, "peer connection state changed");
                match s {
                    RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Disconnected
                    | RTCPeerConnectionState::Closed => {
                        let _ = tx
                            .send(LinkEvent {
                                side,
                                generation,
                                kind: LinkEventKind::Closed,
                            })
                            .await;
                    }
                    _ => {}
                }
            })
        }));

        let ice_tx = events.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    warn!(side = %side, "local candidate could not be serialized");
                    return;
                };
                let _ = tx
                    .send(LinkEvent {
                        side,
                        generation,
                        kind: LinkEventKind::LocalCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                        }),
                    })
                    .await;
            })
        }));

        let nego_tx = events.clone();
        pc.on_negotiation_needed(Box::new(move || {
            let tx = nego_tx.clone();
            Box::pin(async move {
                let _ = tx
                    .send(LinkEvent {
                        side,
                        generation,
                        kind: LinkEventKind::NegotiationNeeded,
                    })
                    .await;
            })
        }));

        let track_tx = events.clone();
        let track_registry = self.registry.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let tx = track_tx.clone();
            let registry = track_registry.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    RTPCodecType::Video => TrackKind::Video,
                    other => {
                        warn!(side = %side, kind = ?other, "remote track of unknown kind");
                        return;
                    }
                };
                let id = track.id();
                registry
                    .lock()
                    .await
                    .remotes
                    .insert(id.clone(), track.clone());
                let source = RemoteSample {
                    id,
                    kind,
                    _track: track,
                };
                let _ = tx
                    .send(LinkEvent {
                        side,
                        generation,
                        kind: LinkEventKind::RemoteTrack(Arc::new(source)),
                    })
                    .await;
            })
        }));

        Ok(Arc::new(WebRtcTransport {
            pc,
            registry: self.registry.clone(),
            own_tracks: Mutex::new(Vec::new()),
        }))
    }
}

pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    registry: Arc<Mutex<MediaRegistry>>,
    own_tracks: Mutex<Vec<String>>,
}

fn codec_for(kind: TrackKind) -> RTCRtpCodecCapability {
    match kind {
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_string(),
            clock_rate: 48_000,
            channels: 2,
            ..Default::default()
        },
        TrackKind::Video => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_string(),
            clock_rate: 90_000,
            ..Default::default()
        },
    }
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn add_local_track(&self, track: &LocalTrack) -> Result<(), TransportError> {
        let sample_track = Arc::new(TrackLocalStaticSample::new(
            codec_for(track.kind),
            track.id.clone(),
            "tincan".to_string(),
        ));

        let rtp_sender = self
            .pc
            .add_track(Arc::clone(&sample_track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;

        // Drain RTCP so the interceptors keep flowing.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
        });

        self.registry
            .lock()
            .await
            .writers
            .insert(track.id.clone(), sample_track);
        self.own_tracks.lock().await.push(track.id.clone());
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, TransportError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        self.pc
            .set_local_description(offer.clone())
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String, TransportError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        self.pc
            .set_local_description(answer.clone())
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        Ok(answer.sdp)
    }

    async fn apply_remote_offer(&self, sdp: String) -> Result<(), TransportError> {
        let desc = RTCSessionDescription::offer(sdp)
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))
    }

    async fn apply_remote_answer(&self, sdp: String) -> Result<(), TransportError> {
        let desc = RTCSessionDescription::answer(sdp)
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))
    }

    async fn apply_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| TransportError::Candidate(e.to_string()))
    }

    async fn close(&self) {
        let own = std::mem::take(&mut *self.own_tracks.lock().await);
        if !own.is_empty() {
            let mut registry = self.registry.lock().await;
            for id in own {
                registry.writers.remove(&id);
            }
        }
        if let Err(e) = self.pc.close().await {
            warn!(error = %e, "peer connection close failed");
        }
    }
}
