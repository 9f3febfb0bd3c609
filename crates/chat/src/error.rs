//! Fehlertypen fuer das Chat-Crate

use kryptochat_crypto::CryptoError;
use kryptochat_db::DbError;
use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    /// Fuer eine beteiligte Identitaet existiert kein Schluesselpaar
    #[error("Schluessel nicht gefunden: {0}")]
    SchluesselNichtGefunden(String),

    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),

    #[error("Persistenz-Fehler: {0}")]
    Persistenz(#[from] DbError),

    #[error("Ungueltiger Frame: {0}")]
    UngueltigerFrame(String),

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Krypto-Fehler: {0}")]
    Krypto(CryptoError),

    #[error("Raum-Pipeline fuer '{0}' nicht erreichbar")]
    RaumGeschlossen(String),
}

impl From<CryptoError> for ChatError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeinSchluessel { identitaet } => Self::SchluesselNichtGefunden(identitaet),
            CryptoError::Entschluesselung(msg) => Self::Entschluesselung(msg),
            andere => Self::Krypto(andere),
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
