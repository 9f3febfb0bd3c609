//! SQLite-Backend fuer `MessageStore`

pub mod messages;
pub mod pool;
pub mod rooms;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kryptochat_core::{RoomSlug, Username};

use crate::error::DbError;
use crate::models::{NachrichtRecord, NeueNachricht};
use crate::repository::{DbResult, MessageStore};

pub use pool::SqliteDb;

#[async_trait]
impl MessageStore for SqliteDb {
    async fn create_room(&self, room: &RoomSlug) -> DbResult<bool> {
        self.raum_anlegen(room).await
    }

    async fn room_exists(&self, room: &RoomSlug) -> DbResult<bool> {
        self.raum_existiert(room).await
    }

    async fn append(&self, nachricht: NeueNachricht) -> DbResult<NachrichtRecord> {
        self.nachricht_anhaengen(nachricht).await
    }

    async fn history_of(&self, room: &RoomSlug, limit: i64) -> DbResult<Vec<NachrichtRecord>> {
        self.verlauf_laden(room, limit).await
    }

    async fn add_member(&self, room: &RoomSlug, user: &Username) -> DbResult<()> {
        self.mitglied_eintragen(room, user).await
    }

    async fn remove_member(&self, room: &RoomSlug, user: &Username) -> DbResult<()> {
        self.mitglied_austragen(room, user).await
    }

    async fn roster_of(&self, room: &RoomSlug) -> DbResult<Vec<Username>> {
        self.mitglieder_laden(room).await
    }

    async fn pruefen(&self) -> DbResult<()> {
        self.erreichbar().await
    }
}

pub(crate) fn zeitstempel(zeit: DateTime<Utc>) -> String {
    zeit.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

pub(crate) fn parse_timestamp(s: String) -> DbResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .or_else(|_| {
            // Fallback fuer SQLite datetime()-Format ohne 'T' und 'Z'
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc().fixed_offset())
        })
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige Zeitangabe '{s}': {e}")))
}

pub(crate) fn parse_username(s: String) -> DbResult<Username> {
    Username::parse(s).map_err(|e| DbError::ungueltige_daten(e.to_string()))
}

pub(crate) fn parse_slug(s: String) -> DbResult<RoomSlug> {
    RoomSlug::parse(s).map_err(|e| DbError::ungueltige_daten(e.to_string()))
}
