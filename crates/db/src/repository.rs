//! Repository-Trait und Datenbank-Konfiguration
//!
//! `MessageStore` entkoppelt den Chat-Kern von der konkreten Ablage. Alle
//! Methoden sind async und das Trait ist objektsicher, damit der Hub einen
//! `Arc<dyn MessageStore>` in seine Raum-Worker geben kann.

use async_trait::async_trait;
use kryptochat_core::{RoomSlug, Username};

use crate::error::DbError;
use crate::models::{NachrichtRecord, NeueNachricht};

pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://kryptochat.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://kryptochat.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Ablage fuer Raeume, Mitgliedschaften und verschluesselte Nachrichten
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Legt einen Raum an. Gibt `true` zurueck wenn er neu ist.
    async fn create_room(&self, room: &RoomSlug) -> DbResult<bool>;

    /// Prueft ob ein Raum existiert
    async fn room_exists(&self, room: &RoomSlug) -> DbResult<bool>;

    /// Haengt eine Nachricht an (`NichtGefunden` bei unbekanntem Raum)
    async fn append(&self, nachricht: NeueNachricht) -> DbResult<NachrichtRecord>;

    /// Die letzten `limit` Nachrichten eines Raums, aelteste zuerst
    async fn history_of(&self, room: &RoomSlug, limit: i64) -> DbResult<Vec<NachrichtRecord>>;

    /// Traegt ein Mitglied in die Raum-Liste ein (idempotent)
    async fn add_member(&self, room: &RoomSlug, user: &Username) -> DbResult<()>;

    /// Entfernt ein Mitglied aus der Raum-Liste (idempotent)
    async fn remove_member(&self, room: &RoomSlug, user: &Username) -> DbResult<()>;

    /// Gespeicherte Mitglieder eines Raums, sortiert
    async fn roster_of(&self, room: &RoomSlug) -> DbResult<Vec<Username>>;

    /// Prueft ob die Ablage erreichbar ist
    async fn pruefen(&self) -> DbResult<()>;
}
