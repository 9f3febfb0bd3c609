//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Kein Schluesselpaar fuer Identitaet '{identitaet}'")]
    KeinSchluessel { identitaet: String },

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Ungueltige Identitaet: {0}")]
    UngueltigeIdentitaet(#[from] kryptochat_core::KryptochatError),

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivation(String),

    #[error("Base64-Dekodierung fehlgeschlagen: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    pub fn kein_schluessel(identitaet: impl std::fmt::Display) -> Self {
        Self::KeinSchluessel {
            identitaet: identitaet.to_string(),
        }
    }

    /// Gibt true zurueck wenn fuer die Identitaet kein Schluessel existiert
    pub fn ist_kein_schluessel(&self) -> bool {
        matches!(self, Self::KeinSchluessel { .. })
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
