use std::borrow::Cow;

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use prompterlink_shared::{decode_message, encode_message, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::logic::Registration;
use crate::qr::{qr_data_url, remote_url};
use crate::state::{AppState, Outbound};

#[derive(Deserialize)]
pub struct WsQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Serialize)]
pub struct QrCodeResponse {
    pub qrcode: String,
    pub url: String,
    pub ip: String,
    pub port: u16,
}

pub async fn ws_handler(
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let role = Role::from_query(query.kind.as_deref());
    ws.on_upgrade(move |socket| handle_socket(socket, state, role))
}

async fn handle_socket(socket: WebSocket, state: AppState, role: Role) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let connection_id = Uuid::new_v4();

    let registration = {
        let mut relay = state.relay.write().await;
        let registration = relay.register(connection_id, role, tx);
        tracing::info!(
            conn = %connection_id,
            role = role.as_query(),
            ?registration,
            remotes = relay.remotes.len(),
            "WS connected"
        );
        registration
    };

    let send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Message(message) => {
                    let payload = match encode_message(&message) {
                        Ok(payload) => payload,
                        Err(error) => {
                            tracing::warn!(%error, kind = message.kind(), "WS encode failed");
                            continue;
                        }
                    };
                    if socket_sender.send(WsMessage::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: Cow::Borrowed(reason),
                    };
                    let _ = socket_sender.send(WsMessage::Close(Some(frame))).await;
                    break;
                }
            }
        }
    });

    if registration == Registration::Rejected {
        let _ = send_task.await;
        return;
    }

    let mut close_frame = None;

    while let Some(Ok(message)) = socket_receiver.next().await {
        match message {
            WsMessage::Text(text) => match decode_message(&text) {
                Ok(Some(message)) => {
                    tracing::debug!(conn = %connection_id, kind = message.kind(), "WS message");
                    state.relay.write().await.handle(connection_id, message);
                }
                Ok(None) => {
                    tracing::debug!(conn = %connection_id, "WS message of unknown type ignored");
                }
                Err(error) => {
                    tracing::warn!(conn = %connection_id, %error, "WS message dropped");
                }
            },
            WsMessage::Binary(data) => {
                tracing::warn!(
                    conn = %connection_id,
                    bytes = data.len(),
                    "WS binary frame dropped"
                );
            }
            WsMessage::Close(frame) => {
                close_frame = frame;
                break;
            }
            _ => {}
        }
    }

    {
        let mut relay = state.relay.write().await;
        let removed = relay.unregister(connection_id);
        tracing::info!(
            conn = %connection_id,
            role = role.as_query(),
            slot_cleared = removed.is_some(),
            remotes = relay.remotes.len(),
            "WS disconnected"
        );
        if let Some(frame) = &close_frame {
            tracing::debug!(
                conn = %connection_id,
                code = frame.code,
                reason = %frame.reason,
                "WS close frame"
            );
        }
    }
    send_task.abort();
}

pub async fn qrcode_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let lan_ip = state.config.lan_ip.as_deref().unwrap_or("localhost");
    let url = remote_url(host, proto, lan_ip, state.config.port);

    match qr_data_url(&url) {
        Ok(qrcode) => Json(QrCodeResponse {
            qrcode,
            url,
            ip: host.unwrap_or(lan_ip).to_string(),
            port: state.config.port,
        })
        .into_response(),
        Err(error) => {
            tracing::error!(%error, %url, "QR code generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to generate QR code" })),
            )
                .into_response()
        }
    }
}
