//! Prometheus-kompatible Metriken fuer Kryptochat
//!
//! Registrierte Metriken:
//! - `kryptochat_connected_sessions` – Gauge: Aktuell verbundene Sitzungen
//! - `kryptochat_room_pipelines_active` – Gauge: Gestartete Raum-Pipelines
//! - `kryptochat_messages_routed_total` – Counter: Gespeicherte und verteilte Nachrichten
//! - `kryptochat_deliveries_total` – Counter: Zustellungen an Mitglieder
//! - `kryptochat_deliveries_dropped_total` – Counter: Verworfene Zustellungen
//! - `kryptochat_persistence_failures_total` – Counter: Fehlgeschlagene Speicherungen
//! - `kryptochat_key_failures_total` – Counter: Fehlende Schluessel
//! - `kryptochat_decrypt_failures_total` – Counter: Fehlgeschlagene Entschluesselungen
//! - `kryptochat_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `kryptochat_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Zaehlerstaende des Chat-Kerns
///
/// Entkoppelt die Metriken vom Chat-Crate: der Server fuellt diese Werte aus
/// der Hub-Statistik.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatKennzahlen {
    pub verbundene_sitzungen: u64,
    pub aktive_pipelines: u64,
    pub nachrichten_geroutet: u64,
    pub zustellungen: u64,
    pub verworfene_zustellungen: u64,
    pub persistenz_fehler: u64,
    pub schluessel_fehler: u64,
    pub entschluesselungs_fehler: u64,
}

/// Alle Kryptochat-Prometheus-Metriken
#[derive(Clone)]
pub struct KryptochatMetrics {
    pub registry: Arc<Registry>,

    // Chat-Metriken
    pub connected_sessions: IntGauge,
    pub room_pipelines_active: IntGauge,
    pub messages_routed_total: IntCounter,
    pub deliveries_total: IntCounter,
    pub deliveries_dropped_total: IntCounter,
    pub persistence_failures_total: IntCounter,
    pub key_failures_total: IntCounter,
    pub decrypt_failures_total: IntCounter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

fn zaehler(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn anzeige(registry: &Registry, name: &str, hilfe: &str) -> Result<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Erhoeht einen Counter auf einen absoluten Zaehlerstand
fn nachziehen(counter: &IntCounter, stand: u64) {
    let delta = stand.saturating_sub(counter.get());
    if delta > 0 {
        counter.inc_by(delta);
    }
}

impl KryptochatMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Chat-Metriken ---
        let connected_sessions = anzeige(
            &registry,
            "kryptochat_connected_sessions",
            "Anzahl aktuell verbundener Sitzungen",
        )?;
        let room_pipelines_active = anzeige(
            &registry,
            "kryptochat_room_pipelines_active",
            "Anzahl gestarteter Raum-Pipelines",
        )?;
        let messages_routed_total = zaehler(
            &registry,
            "kryptochat_messages_routed_total",
            "Gespeicherte und verteilte Nachrichten",
        )?;
        let deliveries_total = zaehler(
            &registry,
            "kryptochat_deliveries_total",
            "Zustellungen an Raum-Mitglieder",
        )?;
        let deliveries_dropped_total = zaehler(
            &registry,
            "kryptochat_deliveries_dropped_total",
            "Verworfene Zustellungen (Queue voll oder geschlossen)",
        )?;
        let persistence_failures_total = zaehler(
            &registry,
            "kryptochat_persistence_failures_total",
            "Fehlgeschlagene Speicherungen",
        )?;
        let key_failures_total = zaehler(
            &registry,
            "kryptochat_key_failures_total",
            "Nachrichten ohne Schluessel des Autors",
        )?;
        let decrypt_failures_total = zaehler(
            &registry,
            "kryptochat_decrypt_failures_total",
            "Fehlgeschlagene Entschluesselungen",
        )?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("kryptochat_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "kryptochat_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_sessions,
            room_pipelines_active,
            messages_routed_total,
            deliveries_total,
            deliveries_dropped_total,
            persistence_failures_total,
            key_failures_total,
            decrypt_failures_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Uebernimmt die aktuellen Zaehlerstaende des Chat-Kerns
    pub fn chat_aktualisieren(&self, k: &ChatKennzahlen) {
        self.connected_sessions
            .set(i64::try_from(k.verbundene_sitzungen).unwrap_or(i64::MAX));
        self.room_pipelines_active
            .set(i64::try_from(k.aktive_pipelines).unwrap_or(i64::MAX));
        nachziehen(&self.messages_routed_total, k.nachrichten_geroutet);
        nachziehen(&self.deliveries_total, k.zustellungen);
        nachziehen(&self.deliveries_dropped_total, k.verworfene_zustellungen);
        nachziehen(&self.persistence_failures_total, k.persistenz_fehler);
        nachziehen(&self.key_failures_total, k.schluessel_fehler);
        nachziehen(&self.decrypt_failures_total, k.entschluesselungs_fehler);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: KryptochatMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<KryptochatMetrics>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
