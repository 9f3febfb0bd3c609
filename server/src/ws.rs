//! WebSocket-Endpunkt
//!
//! `GET /ws/chat/:room_slug?benutzer=<name>` – eine `ConnectionSession` pro
//! Socket. Eingehende Text-Frames gehen an `on_frame`, Zustellungen aus der
//! Sitzungs-Queue werden als Text-Frames zurueckgeschrieben.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use kryptochat_chat::{AusgehenderFrame, ConnectionSession, SessionOptionen};
use kryptochat_core::{RoomSlug, Username};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ApiFehler, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParameter {
    pub benutzer: String,
}

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/chat/:room_slug", get(ws_verbinden))
}

/// Prueft Raum und Benutzer, dann Upgrade auf WebSocket
///
/// Die Pruefung laeuft vor dem Upgrade, damit Clients einen
/// aussagekraeftigen HTTP-Status bekommen.
async fn ws_verbinden(
    State(state): State<AppState>,
    Path(room_slug): Path<String>,
    Query(params): Query<WsParameter>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    let room = RoomSlug::parse(room_slug)?;
    let user = Username::parse(params.benutzer)?;

    raum_sicherstellen(&state, &room).await?;

    if !state.hub.keystore().contains(&user).await? {
        return Err(ApiFehler::KeinSchluessel(user.to_string()));
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let optionen = SessionOptionen {
        format: state.config.chat.ausgabe_format,
    };
    Ok(ws
        .on_upgrade(move |socket| verbindung_bedienen(socket, state, room, user, optionen))
        .into_response())
}

/// Legt den Raum an wenn erlaubt, sonst 404 fuer unbekannte Raeume
async fn raum_sicherstellen(state: &AppState, room: &RoomSlug) -> ApiResult<()> {
    let store = state.hub.store();
    if store.room_exists(room).await? {
        return Ok(());
    }
    if !state.config.chat.raeume_automatisch_anlegen {
        return Err(ApiFehler::RaumNichtGefunden(room.to_string()));
    }
    if store.create_room(room).await? {
        info!(room = %room, "Raum automatisch angelegt");
    }
    Ok(())
}

async fn verbindung_bedienen(
    socket: WebSocket,
    state: AppState,
    room: RoomSlug,
    user: Username,
    optionen: SessionOptionen,
) {
    let mut session =
        ConnectionSession::verbinden(state.hub.clone(), room, user, optionen).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            frame = session.naechster_frame() => {
                let Some(frame) = frame else {
                    debug!(session_id = %session.id(), "Sitzung ersetzt, Verbindung wird geschlossen");
                    break;
                };
                if !frame_senden(&mut ws_tx, &frame).await {
                    break;
                }
            }
            eingang = ws_rx.next() => match eingang {
                Some(Ok(Message::Text(text))) => {
                    if let Some(antwort) = session.on_frame(&text).await {
                        if !frame_senden(&mut ws_tx, &antwort).await {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Binary, Ping und Pong tragen keine Chat-Frames
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session_id = %session.id(), fehler = %e, "WebSocket-Fehler");
                    break;
                }
            }
        }
    }

    session.trennen().await;
    let _ = ws_tx.close().await;
}

/// Sendet einen Frame, `false` wenn der Socket nicht mehr beschreibbar ist
async fn frame_senden(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    frame: &AusgehenderFrame,
) -> bool {
    let json = match frame.als_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(fehler = %e, "Frame nicht serialisierbar");
            return true;
        }
    };
    ws_tx.send(Message::Text(json)).await.is_ok()
}
