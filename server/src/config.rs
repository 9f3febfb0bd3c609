//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use kryptochat_chat::{AusgabeFormat, HubKonfiguration};
use kryptochat_core::{KryptochatError, RoomSlug, Username};
use kryptochat_crypto::CipherAlgorithm;
use kryptochat_db::DatabaseConfig;
use kryptochat_observability::logging::{log_format_gueltig, log_level_gueltig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Schluesselablage und Verschluesselung
    pub schluessel: SchluesselEinstellungen,
    /// Raeume und Nachrichten-Pipeline
    pub chat: ChatEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Kryptochat Server".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub http_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 8000,
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Datenbank-Typ: "sqlite" oder "memory"
    pub typ: String,
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Modus fuer SQLite
    pub wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            typ: "sqlite".into(),
            url: "sqlite://kryptochat.db".into(),
            max_verbindungen: 5,
            wal: true,
        }
    }
}

impl DatenbankEinstellungen {
    pub fn als_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_verbindungen: self.max_verbindungen,
            sqlite_wal: self.wal,
        }
    }
}

/// Schluesselablage und Verschluesselung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchluesselEinstellungen {
    /// Verzeichnis mit `public/` und `private/` Unterordnern
    pub verzeichnis: String,
    /// AEAD-Algorithmus fuer neue Nachrichten
    pub algorithmus: CipherAlgorithm,
    /// Benutzer deren Schluesselpaar beim Start bereitgestellt wird
    pub vorab_erzeugen: Vec<String>,
}

impl Default for SchluesselEinstellungen {
    fn default() -> Self {
        Self {
            verzeichnis: "keys".into(),
            algorithmus: CipherAlgorithm::default(),
            vorab_erzeugen: vec![],
        }
    }
}

/// Raeume und Nachrichten-Pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatEinstellungen {
    /// Raeume die beim Start angelegt werden
    pub raeume: Vec<String>,
    /// Unbekannte Raeume beim ersten Verbinden anlegen
    pub raeume_automatisch_anlegen: bool,
    /// Groesse der Auftrags-Queue pro Raum
    pub raum_queue_groesse: usize,
    /// Groesse der Zustell-Queue pro Sitzung
    pub sende_queue_groesse: usize,
    /// Maximale Nachrichtenlaenge in Zeichen
    pub max_nachrichten_laenge: usize,
    /// Format des Nachrichtentexts: "text" oder "html"
    pub ausgabe_format: AusgabeFormat,
    /// Standard-Anzahl Eintraege fuer den Verlauf
    pub verlauf_limit: i64,
    /// Sekunden ohne Auftrag bis eine Raum-Pipeline ohne Mitglieder endet
    pub pipeline_leerlauf_sekunden: u64,
}

impl Default for ChatEinstellungen {
    fn default() -> Self {
        let hub = HubKonfiguration::default();
        Self {
            raeume: vec!["general".into()],
            raeume_automatisch_anlegen: false,
            raum_queue_groesse: hub.raum_queue_groesse,
            sende_queue_groesse: hub.sende_queue_groesse,
            max_nachrichten_laenge: hub.max_nachrichten_laenge,
            ausgabe_format: AusgabeFormat::default(),
            verlauf_limit: 50,
            pipeline_leerlauf_sekunden: hub.pipeline_leerlauf.as_secs(),
        }
    }
}

impl ChatEinstellungen {
    pub fn als_hub_konfiguration(&self) -> HubKonfiguration {
        HubKonfiguration {
            raum_queue_groesse: self.raum_queue_groesse,
            sende_queue_groesse: self.sende_queue_groesse,
            max_nachrichten_laenge: self.max_nachrichten_laenge,
            pipeline_leerlauf: Duration::from_secs(self.pipeline_leerlauf_sekunden),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };

        config.validieren()?;
        Ok(config)
    }

    /// Prueft Werte die serde allein nicht abdeckt
    pub fn validieren(&self) -> Result<(), KryptochatError> {
        if !matches!(self.datenbank.typ.as_str(), "sqlite" | "memory") {
            return Err(KryptochatError::konfiguration(format!(
                "Unbekannter Datenbank-Typ '{}'",
                self.datenbank.typ
            )));
        }
        if self.chat.raum_queue_groesse == 0 || self.chat.sende_queue_groesse == 0 {
            return Err(KryptochatError::konfiguration(
                "Queue-Groessen muessen groesser als 0 sein",
            ));
        }
        if self.chat.max_nachrichten_laenge == 0 {
            return Err(KryptochatError::konfiguration(
                "max_nachrichten_laenge muss groesser als 0 sein",
            ));
        }
        if self.chat.pipeline_leerlauf_sekunden == 0 {
            return Err(KryptochatError::konfiguration(
                "pipeline_leerlauf_sekunden muss groesser als 0 sein",
            ));
        }
        if self.chat.verlauf_limit < 1 {
            return Err(KryptochatError::konfiguration(
                "verlauf_limit muss mindestens 1 sein",
            ));
        }
        if !log_level_gueltig(&self.logging.level) {
            return Err(KryptochatError::konfiguration(format!(
                "Ungueltiges Log-Level '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(KryptochatError::konfiguration(format!(
                "Ungueltiges Log-Format '{}'",
                self.logging.format
            )));
        }

        self.raeume()?;
        self.vorab_benutzer()?;
        Ok(())
    }

    /// Konfigurierte Raeume als geprueften Slug
    pub fn raeume(&self) -> Result<Vec<RoomSlug>, KryptochatError> {
        self.chat.raeume.iter().map(RoomSlug::parse).collect()
    }

    /// Benutzer fuer die beim Start Schluessel bereitgestellt werden
    pub fn vorab_benutzer(&self) -> Result<Vec<Username>, KryptochatError> {
        self.schluessel
            .vorab_erzeugen
            .iter()
            .map(Username::parse)
            .collect()
    }

    /// Gibt die Bind-Adresse fuer HTTP und WebSocket zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert!(cfg.validieren().is_ok());
        assert_eq!(cfg.netzwerk.http_port, 8000);
        assert_eq!(cfg.datenbank.typ, "sqlite");
        assert_eq!(cfg.chat.raeume, vec!["general".to_string()]);
        assert_eq!(cfg.chat.ausgabe_format, AusgabeFormat::Text);
        assert_eq!(cfg.schluessel.algorithmus, CipherAlgorithm::Aes256Gcm);
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_bind_adresse(), "0.0.0.0:8000");
        assert_eq!(cfg.observability_bind_adresse(), "0.0.0.0:9300");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Server"

            [schluessel]
            algorithmus = "cha-cha20-poly1305"
            vorab_erzeugen = ["alice", "bob"]

            [chat]
            raeume = ["general", "Random"]
            ausgabe_format = "html"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Server");
        assert_eq!(cfg.schluessel.algorithmus, CipherAlgorithm::ChaCha20Poly1305);
        assert_eq!(cfg.chat.ausgabe_format, AusgabeFormat::Html);
        assert_eq!(
            cfg.raeume().unwrap(),
            vec![
                RoomSlug::parse("general").unwrap(),
                RoomSlug::parse("random").unwrap()
            ]
        );
        assert_eq!(cfg.vorab_benutzer().unwrap().len(), 2);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.http_port, 8000);
        assert_eq!(cfg.chat.verlauf_limit, 50);
        assert_eq!(
            cfg.chat.als_hub_konfiguration().pipeline_leerlauf,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.chat.raeume.push("kein slug!".into());
        assert!(matches!(
            cfg.validieren(),
            Err(KryptochatError::UngueltigerRaum(_))
        ));

        let mut cfg = ServerConfig::default();
        cfg.datenbank.typ = "postgres".into();
        assert!(matches!(
            cfg.validieren(),
            Err(KryptochatError::Konfiguration(_))
        ));

        let mut cfg = ServerConfig::default();
        cfg.chat.sende_queue_groesse = 0;
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.logging.level = "laut".into();
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/gibt/es/nicht/kryptochat.toml").unwrap();
        assert_eq!(cfg.server.name, "Kryptochat Server");
    }
}
