//! SQLite-Zugriffe fuer Raeume und Mitglieder

use chrono::Utc;
use kryptochat_core::{RoomSlug, Username};
use sqlx::Row as _;

use crate::error::DbError;
use crate::repository::DbResult;
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{parse_username, zeitstempel};

impl SqliteDb {
    pub(crate) async fn raum_anlegen(&self, room: &RoomSlug) -> DbResult<bool> {
        let affected = sqlx::query("INSERT OR IGNORE INTO rooms (slug, created_at) VALUES (?, ?)")
            .bind(room.as_str())
            .bind(zeitstempel(Utc::now()))
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected > 0 {
            tracing::info!(room = %room, "Raum angelegt");
        }
        Ok(affected > 0)
    }

    pub(crate) async fn raum_existiert(&self, room: &RoomSlug) -> DbResult<bool> {
        let row = sqlx::query("SELECT 1 FROM rooms WHERE slug = ?")
            .bind(room.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub(crate) async fn mitglied_eintragen(&self, room: &RoomSlug, user: &Username) -> DbResult<()> {
        if !self.raum_existiert(room).await? {
            return Err(DbError::nicht_gefunden(format!("Raum '{room}'")));
        }

        sqlx::query(
            "INSERT OR IGNORE INTO room_members (room_slug, username, joined_at)
             VALUES (?, ?, ?)",
        )
        .bind(room.as_str())
        .bind(user.as_str())
        .bind(zeitstempel(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(crate) async fn mitglied_austragen(&self, room: &RoomSlug, user: &Username) -> DbResult<()> {
        sqlx::query("DELETE FROM room_members WHERE room_slug = ? AND username = ?")
            .bind(room.as_str())
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub(crate) async fn mitglieder_laden(&self, room: &RoomSlug) -> DbResult<Vec<Username>> {
        let rows = sqlx::query(
            "SELECT username FROM room_members WHERE room_slug = ? ORDER BY username",
        )
        .bind(room.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| parse_username(r.try_get("username")?))
            .collect()
    }
}
