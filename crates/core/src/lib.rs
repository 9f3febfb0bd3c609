//! kryptochat-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Identitaets-Typen bereit, die von allen
//! anderen Kryptochat-Crates gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{KryptochatError, Result};
pub use types::{MessageId, RoomSlug, SessionId, Username};
