use axum::Json;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use tincan_core::{ParticipantId, SignalMessage};

use crate::service::RelayService;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(participant_id): Path<String>,
    State(service): State<RelayService>,
) -> impl IntoResponse {
    let Some(id) = ParticipantId::parse(&participant_id) else {
        return (StatusCode::BAD_REQUEST, "invalid participant id").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, id, service))
        .into_response()
}

pub async fn stats_handler(State(service): State<RelayService>) -> impl IntoResponse {
    Json(serde_json::json!({ "online": service.online_count() }))
}

async fn handle_socket(socket: WebSocket, id: ParticipantId, service: RelayService) {
    info!(%id, "participant connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<SignalMessage>();

    service.register(id.clone(), tx).await;

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!("failed to serialize signal: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let id = id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(signal) => service.signal(id.clone(), signal).await,
                        Err(e) => warn!(%id, "invalid signal frame: {e}"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.unregister(&id).await;
    info!(%id, "participant disconnected");
}
