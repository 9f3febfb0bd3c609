//! REST-Endpunkte fuer Raeume
//!
//! - `GET /api/raeume/:room_slug/verlauf?limit=N` – entschluesselter Verlauf
//! - `GET /api/raeume/:room_slug/mitglieder`      – verbundene und gespeicherte Mitglieder

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use kryptochat_chat::VerlaufsEintrag;
use kryptochat_core::RoomSlug;
use serde::{Deserialize, Serialize};

use crate::error::{ApiFehler, ApiResult};
use crate::AppState;

/// Obergrenze fuer `limit`
pub const MAX_VERLAUF_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct VerlaufParameter {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct VerlaufAntwort {
    pub room: String,
    pub nachrichten: Vec<VerlaufsEintrag>,
}

#[derive(Debug, Serialize)]
pub struct MitgliederAntwort {
    pub room: String,
    /// Benutzer mit offener Sitzung
    pub verbunden: Vec<String>,
    /// Persistierte Mitgliedschaft
    pub gespeichert: Vec<String>,
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/raeume/:room_slug/verlauf", get(verlauf))
        .route("/api/raeume/:room_slug/mitglieder", get(mitglieder))
}

async fn bekannter_raum(state: &AppState, room_slug: String) -> ApiResult<RoomSlug> {
    let room = RoomSlug::parse(room_slug)?;
    if !state.hub.store().room_exists(&room).await? {
        return Err(ApiFehler::RaumNichtGefunden(room.to_string()));
    }
    Ok(room)
}

async fn verlauf(
    State(state): State<AppState>,
    Path(room_slug): Path<String>,
    Query(params): Query<VerlaufParameter>,
) -> ApiResult<Json<VerlaufAntwort>> {
    let room = bekannter_raum(&state, room_slug).await?;
    let limit = params
        .limit
        .unwrap_or(state.config.chat.verlauf_limit)
        .clamp(1, MAX_VERLAUF_LIMIT);

    let nachrichten = state.hub.history(&room, limit).await?;
    Ok(Json(VerlaufAntwort {
        room: room.to_string(),
        nachrichten,
    }))
}

async fn mitglieder(
    State(state): State<AppState>,
    Path(room_slug): Path<String>,
) -> ApiResult<Json<MitgliederAntwort>> {
    let room = bekannter_raum(&state, room_slug).await?;
    let verbunden = state
        .hub
        .members_of(&room)
        .into_iter()
        .map(|u| u.to_string())
        .collect();
    let gespeichert = state
        .hub
        .store()
        .roster_of(&room)
        .await?
        .into_iter()
        .map(|u| u.to_string())
        .collect();

    Ok(Json(MitgliederAntwort {
        room: room.to_string(),
        verbunden,
        gespeichert,
    }))
}
