//! Fehlertypen fuer Kryptochat
//!
//! Gemeinsamer Fehler-Enum fuer die Identitaets-Typen. Die Fach-Crates
//! definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Kryptochat
pub type Result<T> = std::result::Result<T, KryptochatError>;

/// Fehler beim Erzeugen der gemeinsamen Typen
#[derive(Debug, Error)]
pub enum KryptochatError {
    #[error("Ungueltiger Benutzername: '{0}'")]
    UngueltigerBenutzername(String),

    #[error("Ungueltiger Raum-Slug: '{0}'")]
    UngueltigerRaum(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl KryptochatError {
    /// Erstellt einen Konfigurationsfehler aus einer beliebigen Nachricht
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}
