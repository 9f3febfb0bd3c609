//! Tests fuer das Chat-Crate

mod hub_tests;

use std::sync::Arc;

use async_trait::async_trait;
use kryptochat_core::{RoomSlug, Username};
use kryptochat_crypto::{KeyStore, MemoryKeyStore, SealedBoxCipher};
use kryptochat_db::{
    DbError, DbResult, MemoryStore, MessageStore, NachrichtRecord, NeueNachricht,
};
use tokio::sync::Notify;

use crate::hub::{Hub, HubKonfiguration};

pub(crate) fn raum(slug: &str) -> RoomSlug {
    RoomSlug::parse(slug).unwrap()
}

pub(crate) fn user(name: &str) -> Username {
    Username::parse(name).unwrap()
}

/// Alles was ein Test-Hub braucht
pub(crate) struct Umgebung {
    pub hub: Arc<Hub>,
    pub keys: Arc<MemoryKeyStore>,
    pub store: Arc<MemoryStore>,
}

/// Hub mit Schluesseln fuer `benutzer` und angelegten `raeume`
pub(crate) async fn umgebung(benutzer: &[&str], raeume: &[&str]) -> Umgebung {
    let keys = Arc::new(MemoryKeyStore::new());
    let store = Arc::new(MemoryStore::new());
    for name in benutzer {
        keys.ensure_key_pair(&user(name)).await.unwrap();
    }
    for slug in raeume {
        store.create_room(&raum(slug)).await.unwrap();
    }

    let hub = Hub::neu(
        keys.clone(),
        Arc::new(SealedBoxCipher::default()),
        store.clone(),
        HubKonfiguration::default(),
    );
    Umgebung { hub, keys, store }
}

/// Ablage die `append` fuer einen Raum blockiert bis sie freigegeben wird
/// oder fuer einen Raum immer fehlschlaegt
pub(crate) struct TestStore {
    pub inner: MemoryStore,
    pub blockierter_raum: Option<RoomSlug>,
    pub fehlerhafter_raum: Option<RoomSlug>,
    pub freigabe: Notify,
    pub angekommen: Notify,
}

impl TestStore {
    pub fn neu() -> Self {
        Self {
            inner: MemoryStore::new(),
            blockierter_raum: None,
            fehlerhafter_raum: None,
            freigabe: Notify::new(),
            angekommen: Notify::new(),
        }
    }
}

#[async_trait]
impl MessageStore for TestStore {
    async fn create_room(&self, room: &RoomSlug) -> DbResult<bool> {
        self.inner.create_room(room).await
    }

    async fn room_exists(&self, room: &RoomSlug) -> DbResult<bool> {
        self.inner.room_exists(room).await
    }

    async fn append(&self, nachricht: NeueNachricht) -> DbResult<NachrichtRecord> {
        if self.fehlerhafter_raum.as_ref() == Some(&nachricht.room) {
            return Err(DbError::intern("Platte voll"));
        }
        if self.blockierter_raum.as_ref() == Some(&nachricht.room) {
            self.angekommen.notify_one();
            self.freigabe.notified().await;
        }
        self.inner.append(nachricht).await
    }

    async fn history_of(&self, room: &RoomSlug, limit: i64) -> DbResult<Vec<NachrichtRecord>> {
        self.inner.history_of(room, limit).await
    }

    async fn add_member(&self, room: &RoomSlug, user: &Username) -> DbResult<()> {
        self.inner.add_member(room, user).await
    }

    async fn remove_member(&self, room: &RoomSlug, user: &Username) -> DbResult<()> {
        self.inner.remove_member(room, user).await
    }

    async fn roster_of(&self, room: &RoomSlug) -> DbResult<Vec<Username>> {
        self.inner.roster_of(room).await
    }

    async fn pruefen(&self) -> DbResult<()> {
        self.inner.pruefen().await
    }
}
