//! In-Memory-Implementierung von `MessageStore`
//!
//! Fuer Tests und fuer Betrieb ohne Datenbank. Alle Daten liegen hinter
//! einem einzigen Mutex, der nie ueber einen `.await` gehalten wird.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use kryptochat_core::{MessageId, RoomSlug, Username};
use parking_lot::Mutex;

use crate::error::DbError;
use crate::models::{NachrichtRecord, NeueNachricht};
use crate::repository::{DbResult, MessageStore};

#[derive(Debug, Default)]
struct RaumDaten {
    mitglieder: BTreeSet<Username>,
    nachrichten: Vec<NachrichtRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    raeume: BTreeMap<RoomSlug, RaumDaten>,
    naechste_seq: i64,
}

/// Fluechtige Ablage im Prozessspeicher
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anzahl aller gespeicherten Nachrichten
    pub fn anzahl_nachrichten(&self) -> usize {
        self.inner
            .lock()
            .raeume
            .values()
            .map(|r| r.nachrichten.len())
            .sum()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn pruefen(&self) -> DbResult<()> {
        Ok(())
    }

    async fn create_room(&self, room: &RoomSlug) -> DbResult<bool> {
        let mut inner = self.inner.lock();
        if inner.raeume.contains_key(room) {
            return Ok(false);
        }
        inner.raeume.insert(room.clone(), RaumDaten::default());
        Ok(true)
    }

    async fn room_exists(&self, room: &RoomSlug) -> DbResult<bool> {
        Ok(self.inner.lock().raeume.contains_key(room))
    }

    async fn append(&self, nachricht: NeueNachricht) -> DbResult<NachrichtRecord> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let raum = inner
            .raeume
            .get_mut(&nachricht.room)
            .ok_or_else(|| DbError::nicht_gefunden(format!("Raum '{}'", nachricht.room)))?;
        inner.naechste_seq += 1;

        let record = NachrichtRecord {
            id: MessageId::new(),
            seq: inner.naechste_seq,
            room: nachricht.room,
            author: nachricht.author,
            ciphertext: nachricht.ciphertext,
            created_at: Utc::now(),
        };
        raum.nachrichten.push(record.clone());
        Ok(record)
    }

    async fn history_of(&self, room: &RoomSlug, limit: i64) -> DbResult<Vec<NachrichtRecord>> {
        let inner = self.inner.lock();
        let Some(raum) = inner.raeume.get(room) else {
            return Ok(Vec::new());
        };
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let start = raum.nachrichten.len().saturating_sub(limit);
        Ok(raum.nachrichten[start..].to_vec())
    }

    async fn add_member(&self, room: &RoomSlug, user: &Username) -> DbResult<()> {
        let mut inner = self.inner.lock();
        let raum = inner
            .raeume
            .get_mut(room)
            .ok_or_else(|| DbError::nicht_gefunden(format!("Raum '{room}'")))?;
        raum.mitglieder.insert(user.clone());
        Ok(())
    }

    async fn remove_member(&self, room: &RoomSlug, user: &Username) -> DbResult<()> {
        if let Some(raum) = self.inner.lock().raeume.get_mut(room) {
            raum.mitglieder.remove(user);
        }
        Ok(())
    }

    async fn roster_of(&self, room: &RoomSlug) -> DbResult<Vec<Username>> {
        Ok(self
            .inner
            .lock()
            .raeume
            .get(room)
            .map(|r| r.mitglieder.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raum() -> RoomSlug {
        RoomSlug::parse("general").unwrap()
    }

    fn alice() -> Username {
        Username::parse("alice").unwrap()
    }

    #[tokio::test]
    async fn anhaengen_an_unbekannten_raum_schlaegt_fehl() {
        let store = MemoryStore::new();
        let err = store
            .append(NeueNachricht {
                room: raum(),
                author: alice(),
                ciphertext: vec![1, 2, 3],
            })
            .await
            .unwrap_err();
        assert!(err.ist_nicht_gefunden());
        assert_eq!(store.anzahl_nachrichten(), 0);
    }

    #[tokio::test]
    async fn verlauf_liefert_die_letzten_in_reihenfolge() {
        let store = MemoryStore::new();
        store.create_room(&raum()).await.unwrap();
        for i in 0..5u8 {
            store
                .append(NeueNachricht {
                    room: raum(),
                    author: alice(),
                    ciphertext: vec![i],
                })
                .await
                .unwrap();
        }

        let verlauf = store.history_of(&raum(), 3).await.unwrap();
        let inhalte: Vec<u8> = verlauf.iter().map(|n| n.ciphertext[0]).collect();
        assert_eq!(inhalte, vec![2, 3, 4]);
        assert!(verlauf.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test]
    async fn mitglieder_idempotent() {
        let store = MemoryStore::new();
        assert!(store.create_room(&raum()).await.unwrap());
        assert!(!store.create_room(&raum()).await.unwrap());

        store.add_member(&raum(), &alice()).await.unwrap();
        store.add_member(&raum(), &alice()).await.unwrap();
        assert_eq!(store.roster_of(&raum()).await.unwrap(), vec![alice()]);

        store.remove_member(&raum(), &alice()).await.unwrap();
        store.remove_member(&raum(), &alice()).await.unwrap();
        assert!(store.roster_of(&raum()).await.unwrap().is_empty());
    }
}
