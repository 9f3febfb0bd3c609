//! kryptochat-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod api;
pub mod config;
pub mod error;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use config::ServerConfig;
use kryptochat_chat::{Hub, HubStatistik};
use kryptochat_crypto::{DirectoryKeyStore, KeyStore, SealedBoxCipher};
use kryptochat_db::{MemoryStore, MessageStore, SqliteDb};
use kryptochat_observability::{
    observability_server_starten, request_timing_layer, timing_middleware, ChatKennzahlen,
    HealthState, KryptochatMetrics,
};

/// Intervall fuer das Nachfuehren von Metriken und DB-Status
const KENNZAHLEN_INTERVALL: Duration = Duration::from_secs(5);

/// Geteilter Zustand aller HTTP- und WebSocket-Handler
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub config: Arc<ServerConfig>,
}

/// Baut den HTTP-Router (WebSocket + REST) mit Timing-Middleware
pub fn router(state: AppState, metriken: KryptochatMetrics) -> Router {
    Router::new()
        .merge(ws::ws_router())
        .merge(api::api_router())
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            metriken,
            timing_middleware,
        ))
        .layer(request_timing_layer())
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Oeffnet Speicher und Schluesselablage, legt Raeume an und baut den Hub
    pub async fn hub_aufbauen(&self) -> Result<Arc<Hub>> {
        let store = self.store_oeffnen().await?;

        let keystore: Arc<dyn KeyStore> =
            Arc::new(DirectoryKeyStore::new(&self.config.schluessel.verzeichnis));
        for benutzer in self.config.vorab_benutzer()? {
            if keystore.ensure_key_pair(&benutzer).await? {
                tracing::info!(user = %benutzer, "Schluesselpaar erzeugt");
            }
        }

        for raum in self.config.raeume()? {
            if store.create_room(&raum).await? {
                tracing::info!(room = %raum, "Raum angelegt");
            }
        }

        let cipher = Arc::new(SealedBoxCipher::new(self.config.schluessel.algorithmus));
        Ok(Hub::neu(
            keystore,
            cipher,
            store,
            self.config.chat.als_hub_konfiguration(),
        ))
    }

    async fn store_oeffnen(&self) -> Result<Arc<dyn MessageStore>> {
        let store: Arc<dyn MessageStore> = match self.config.datenbank.typ.as_str() {
            "memory" => {
                tracing::warn!("Fluechtiger Speicher aktiv, Nachrichten gehen beim Neustart verloren");
                Arc::new(MemoryStore::new())
            }
            _ => {
                tracing::info!(url = %self.config.datenbank.url, "Datenbankverbindung wird hergestellt");
                Arc::new(SqliteDb::oeffnen(&self.config.datenbank.als_database_config()).await?)
            }
        };
        Ok(store)
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Speicher, Schluessel und Raeume vorbereiten
    /// 2. Observability-Server und Kennzahlen-Task starten
    /// 3. HTTP/WebSocket-Listener starten
    /// 4. Auf Ctrl-C warten
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            http = %self.config.http_bind_adresse(),
            "Server startet"
        );

        let hub = self.hub_aufbauen().await?;
        let metriken = KryptochatMetrics::neu()?;
        let health = HealthState::neu();

        if self.config.observability.aktiviert {
            let addr: SocketAddr = self.config.observability_bind_adresse().parse()?;
            let (m, h) = (metriken.clone(), health.clone());
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, m, h).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        tokio::spawn(kennzahlen_nachfuehren(
            Arc::clone(&hub),
            metriken.clone(),
            health,
        ));

        let state = AppState {
            hub,
            config: Arc::new(self.config.clone()),
        };
        let app = router(state, metriken);

        let listener = tokio::net::TcpListener::bind(self.config.http_bind_adresse()).await?;
        tracing::info!(adresse = %self.config.http_bind_adresse(), "HTTP/WebSocket bereit");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(fehler = %e, "Shutdown-Signal nicht verfuegbar");
                }
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            })
            .await?;

        Ok(())
    }
}

/// Uebertraegt die Hub-Statistik in Prometheus-Kennzahlen
pub fn kennzahlen_aus(s: HubStatistik) -> ChatKennzahlen {
    ChatKennzahlen {
        verbundene_sitzungen: s.verbundene_sitzungen,
        aktive_pipelines: s.aktive_pipelines,
        nachrichten_geroutet: s.nachrichten_geroutet,
        zustellungen: s.zustellungen,
        verworfene_zustellungen: s.verworfene_zustellungen,
        persistenz_fehler: s.persistenz_fehler,
        schluessel_fehler: s.schluessel_fehler,
        entschluesselungs_fehler: s.entschluesselungs_fehler,
    }
}

/// Fuehrt Kennzahlen und Health-Zustand einmal nach
///
/// Die Nachrichtenablage wird bei jedem Aufruf geprueft, unabhaengig davon
/// ob Raeume konfiguriert sind.
pub async fn kennzahlen_aktualisieren(
    hub: &Hub,
    metriken: &KryptochatMetrics,
    health: &HealthState,
) {
    let statistik = hub.statistik();
    health.sitzungen_setzen(statistik.verbundene_sitzungen);
    metriken.chat_aktualisieren(&kennzahlen_aus(statistik));

    let erreichbar = match hub.store().pruefen().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(fehler = %e, "Datenbank nicht erreichbar");
            false
        }
    };
    health.db_pruefung_melden(erreichbar);
}

async fn kennzahlen_nachfuehren(hub: Arc<Hub>, metriken: KryptochatMetrics, health: HealthState) {
    let mut intervall = tokio::time::interval(KENNZAHLEN_INTERVALL);
    loop {
        intervall.tick().await;
        kennzahlen_aktualisieren(&hub, &metriken, &health).await;
    }
}

#[cfg(test)]
mod tests;
