//! Health-Check-Endpunkt fuer Kryptochat
//!
//! Endpoint: `GET /health`
//!
//! Der Status folgt den Pruefungen der Nachrichtenablage: eine fehlgeschlagene
//! Pruefung ergibt `degraded`, ab `UNHEALTHY_AB_FEHLSCHLAEGEN` in Folge
//! `unhealthy` (503). Eine erfolgreiche Pruefung setzt den Zaehler zurueck.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Fehlgeschlagene Pruefungen in Folge ab denen der Server `unhealthy` ist
pub const UNHEALTHY_AB_FEHLSCHLAEGEN: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Status aus der Anzahl fehlgeschlagener Pruefungen in Folge
    pub fn aus_fehlschlaegen(fehlschlaege: u32) -> Self {
        match fehlschlaege {
            0 => Self::Healthy,
            n if n < UNHEALTHY_AB_FEHLSCHLAEGEN => Self::Degraded,
            _ => Self::Unhealthy,
        }
    }

    pub fn http_status(self) -> StatusCode {
        match self {
            Self::Healthy | Self::Degraded => StatusCode::OK,
            Self::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub db_connected: bool,
    pub db_fehlschlaege: u32,
    pub verbundene_sitzungen: u64,
}

/// Vom Server nachgefuehrter Zustand
#[derive(Debug, Clone)]
pub struct HealthState {
    start: Arc<Instant>,
    db_fehlschlaege: Arc<AtomicU32>,
    verbundene_sitzungen: Arc<AtomicU64>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start: Arc::new(Instant::now()),
            db_fehlschlaege: Arc::new(AtomicU32::new(0)),
            verbundene_sitzungen: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    /// Meldet das Ergebnis einer Pruefung der Nachrichtenablage
    pub fn db_pruefung_melden(&self, erfolgreich: bool) {
        if erfolgreich {
            self.db_fehlschlaege.store(0, Ordering::Relaxed);
        } else {
            self.db_fehlschlaege.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn sitzungen_setzen(&self, anzahl: u64) {
        self.verbundene_sitzungen.store(anzahl, Ordering::Relaxed);
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus::aus_fehlschlaegen(self.db_fehlschlaege.load(Ordering::Relaxed))
    }

    pub fn antwort(&self) -> HealthResponse {
        let db_fehlschlaege = self.db_fehlschlaege.load(Ordering::Relaxed);
        HealthResponse {
            status: HealthStatus::aus_fehlschlaegen(db_fehlschlaege),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            db_connected: db_fehlschlaege == 0,
            db_fehlschlaege,
            verbundene_sitzungen: self.verbundene_sitzungen.load(Ordering::Relaxed),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let antwort = state.antwort();
    (antwort.status.http_status(), Json(antwort))
}
