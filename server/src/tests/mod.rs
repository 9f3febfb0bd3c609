//! Tests fuer HTTP- und WebSocket-Endpunkte


use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use kryptochat_core::RoomSlug;
use kryptochat_observability::KryptochatMetrics;
use tower::ServiceExt;

use crate::{config::ServerConfig, router, AppState, Server};

pub(crate) fn raum(s: &str) -> RoomSlug {
    RoomSlug::parse(s).unwrap()
}

/// Server mit fluechtigem Speicher und Schluesseln in einem Temp-Verzeichnis
///
/// `alice` und `bob` haben Schluessel, `general` existiert.
pub(crate) async fn testzustand(raeume_automatisch: bool) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();

    let mut config = ServerConfig::default();
    config.datenbank.typ = "memory".into();
    config.schluessel.verzeichnis = dir.path().to_string_lossy().into_owned();
    config.schluessel.vorab_erzeugen = vec!["alice".into(), "bob".into()];
    config.chat.raeume_automatisch_anlegen = raeume_automatisch;

    let hub = Server::neu(config.clone()).hub_aufbauen().await.unwrap();
    let state = AppState {
        hub,
        config: Arc::new(config),
    };
    (state, dir)
}

pub(crate) fn app(state: AppState) -> Router {
    router(state, KryptochatMetrics::neu().unwrap())
}

/// GET-Anfrage, liefert Status und JSON-Body (Null bei leerem Body)
pub(crate) async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let antwort = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = antwort.status();
    let bytes = to_bytes(antwort.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
