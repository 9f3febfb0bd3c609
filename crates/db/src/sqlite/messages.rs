//! SQLite-Zugriffe fuer verschluesselte Nachrichten

use chrono::Utc;
use kryptochat_core::{MessageId, RoomSlug};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{NachrichtRecord, NeueNachricht};
use crate::repository::DbResult;
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{parse_slug, parse_timestamp, parse_username, zeitstempel};

impl SqliteDb {
    pub(crate) async fn nachricht_anhaengen(&self, data: NeueNachricht) -> DbResult<NachrichtRecord> {
        if !self.raum_existiert(&data.room).await? {
            return Err(DbError::nicht_gefunden(format!("Raum '{}'", data.room)));
        }

        let id = MessageId::new();
        let now = Utc::now();

        let seq = sqlx::query(
            "INSERT INTO messages (id, room_slug, author, ciphertext, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(data.room.as_str())
        .bind(data.author.as_str())
        .bind(data.ciphertext.as_slice())
        .bind(zeitstempel(now))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        tracing::debug!(room = %data.room, seq, bytes = data.ciphertext.len(), "Nachricht gespeichert");

        Ok(NachrichtRecord {
            id,
            seq,
            room: data.room,
            author: data.author,
            ciphertext: data.ciphertext,
            created_at: now,
        })
    }

    pub(crate) async fn verlauf_laden(
        &self,
        room: &RoomSlug,
        limit: i64,
    ) -> DbResult<Vec<NachrichtRecord>> {
        let rows = sqlx::query(
            "SELECT seq, id, room_slug, author, ciphertext, created_at
             FROM messages
             WHERE room_slug = ?
             ORDER BY seq DESC
             LIMIT ?",
        )
        .bind(room.as_str())
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        // Chronologisch sortieren (aelteste zuerst)
        let mut records: Vec<NachrichtRecord> =
            rows.iter().map(row_to_nachricht).collect::<DbResult<_>>()?;
        records.reverse();
        Ok(records)
    }
}

pub(crate) fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<NachrichtRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DbError::intern(format!("Ungueltige Nachrichten-UUID '{id_str}': {e}")))?;

    Ok(NachrichtRecord {
        id: MessageId(id),
        seq: row.try_get("seq")?,
        room: parse_slug(row.try_get("room_slug")?)?,
        author: parse_username(row.try_get("author")?)?,
        ciphertext: row.try_get("ciphertext")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
    })
}
