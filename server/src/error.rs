//! HTTP-Fehlerantworten
//!
//! Jeder Fehler wird als `{"error": "..."}` mit passendem Statuscode
//! ausgeliefert.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kryptochat_chat::ChatError;
use kryptochat_core::KryptochatError;
use kryptochat_crypto::CryptoError;
use kryptochat_db::DbError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiFehler {
    #[error("{0}")]
    UngueltigeAnfrage(String),

    #[error("Raum '{0}' existiert nicht")]
    RaumNichtGefunden(String),

    #[error("Benutzer '{0}' hat kein Schluesselpaar")]
    KeinSchluessel(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl ApiFehler {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UngueltigeAnfrage(_) => StatusCode::BAD_REQUEST,
            Self::RaumNichtGefunden(_) => StatusCode::NOT_FOUND,
            Self::KeinSchluessel(_) => StatusCode::FORBIDDEN,
            Self::Intern(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<KryptochatError> for ApiFehler {
    fn from(e: KryptochatError) -> Self {
        match e {
            KryptochatError::UngueltigerBenutzername(_) | KryptochatError::UngueltigerRaum(_) => {
                Self::UngueltigeAnfrage(e.to_string())
            }
            andere => Self::Intern(andere.to_string()),
        }
    }
}

impl From<DbError> for ApiFehler {
    fn from(e: DbError) -> Self {
        Self::Intern(e.to_string())
    }
}

impl From<CryptoError> for ApiFehler {
    fn from(e: CryptoError) -> Self {
        Self::Intern(e.to_string())
    }
}

impl From<ChatError> for ApiFehler {
    fn from(e: ChatError) -> Self {
        Self::Intern(e.to_string())
    }
}

impl IntoResponse for ApiFehler {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(fehler = %self, "Anfrage fehlgeschlagen");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiFehler>;
