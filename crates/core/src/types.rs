//! Gemeinsame Identifikationstypen fuer Kryptochat
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Benutzernamen und
//! Raum-Slugs werden beim Erzeugen validiert, weil beide auch als Dateinamen
//! (Schluesselablage) und URL-Segmente verwendet werden.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KryptochatError, Result};

/// Maximale Laenge eines Benutzernamens
pub const MAX_BENUTZERNAME_LAENGE: usize = 150;

/// Maximale Laenge eines Raum-Slugs
pub const MAX_SLUG_LAENGE: usize = 50;

/// Eindeutiger Benutzername (Identitaet eines Users)
///
/// Erlaubt sind Buchstaben, Ziffern und `@ . + - _`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validiert und erstellt einen Benutzernamen
    pub fn parse(roh: impl Into<String>) -> Result<Self> {
        let roh = roh.into();
        if roh.is_empty() || roh.chars().count() > MAX_BENUTZERNAME_LAENGE {
            return Err(KryptochatError::UngueltigerBenutzername(roh));
        }
        let gueltig = roh
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
        // "." und ".." waeren als Dateinamen gefaehrlich
        if !gueltig || roh.chars().all(|c| c == '.') {
            return Err(KryptochatError::UngueltigerBenutzername(roh));
        }
        Ok(Self(roh))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = KryptochatError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Eindeutiger Raum-Bezeichner (Slug)
///
/// Wird kleingeschrieben gespeichert. Erlaubt sind `a-z`, `0-9`, `-` und `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomSlug(String);

impl RoomSlug {
    /// Validiert und erstellt einen Raum-Slug
    pub fn parse(roh: impl Into<String>) -> Result<Self> {
        let slug = roh.into().to_ascii_lowercase();
        let gueltig = !slug.is_empty()
            && slug.len() <= MAX_SLUG_LAENGE
            && slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !gueltig {
            return Err(KryptochatError::UngueltigerRaum(slug));
        }
        Ok(Self(slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomSlug {
    type Error = KryptochatError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<RoomSlug> for String {
    fn from(value: RoomSlug) -> Self {
        value.0
    }
}

impl std::fmt::Display for RoomSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Eindeutige Session-ID (eine pro Verbindung)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Eindeutige Nachrichten-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Erstellt eine neue zufaellige MessageId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "message:{}", self.0)
    }
}
