//! Tests fuer den Hub (Pipeline, Verteilung, Fehler-Isolation)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kryptochat_core::SessionId;
use kryptochat_crypto::{
    CipherEngine, CryptoError, CryptoResult, KeyStore, MemoryKeyStore, PublicKey, SealedBoxCipher,
    SecretBytes,
};
use kryptochat_db::{MemoryStore, MessageStore};
use tokio::sync::mpsc;

use super::{raum, umgebung, user, TestStore};
use crate::error::ChatError;
use crate::hub::{Hub, HubKonfiguration, Zustellung, Zustellziel};

fn ziel() -> (Zustellziel, mpsc::Receiver<Zustellung>) {
    let (tx, rx) = mpsc::channel(64);
    (
        Zustellziel {
            session_id: SessionId::new(),
            tx,
        },
        rx,
    )
}

async fn test_store_hub(store: Arc<TestStore>, benutzer: &[&str]) -> Arc<Hub> {
    let keys = Arc::new(MemoryKeyStore::new());
    for name in benutzer {
        keys.ensure_key_pair(&user(name)).await.unwrap();
    }
    Hub::neu(
        keys,
        Arc::new(SealedBoxCipher::default()),
        store,
        HubKonfiguration::default(),
    )
}

#[tokio::test]
async fn test_nachricht_an_alle_mitglieder() {
    let env = umgebung(&["alice", "bob"], &["general"]).await;
    let (ziel_a, mut rx_a) = ziel();
    let (ziel_b, mut rx_b) = ziel();
    env.hub.on_connect(&raum("general"), &user("alice"), ziel_a).await;
    env.hub.on_connect(&raum("general"), &user("bob"), ziel_b).await;

    let id = env
        .hub
        .route_message(&raum("general"), &user("alice"), "hello")
        .await
        .expect("Senden fehlgeschlagen");

    let bei_bob = rx_b.recv().await.unwrap();
    assert_eq!(bei_bob.message, "hello");
    assert_eq!(bei_bob.author, user("alice"));
    assert_eq!(bei_bob.message_id, id);

    // Der Autor bekommt seine eigene Nachricht ebenfalls
    let bei_alice = rx_a.recv().await.unwrap();
    assert_eq!(bei_alice.message, "hello");
}

#[tokio::test]
async fn test_gespeicherter_ciphertext_ist_entschluesselbar() {
    let env = umgebung(&["alice", "bob"], &["general"]).await;
    let (ziel_b, _rx_b) = ziel();
    env.hub.on_connect(&raum("general"), &user("bob"), ziel_b).await;

    env.hub
        .route_message(&raum("general"), &user("alice"), "hello")
        .await
        .unwrap();

    let verlauf = env.store.history_of(&raum("general"), 10).await.unwrap();
    assert_eq!(verlauf.len(), 1);
    assert_eq!(verlauf[0].author, user("alice"));
    assert_ne!(verlauf[0].ciphertext, b"hello".to_vec());

    let sk = env.keys.private_key_of(&user("alice")).await.unwrap();
    let klartext = SealedBoxCipher::default()
        .decrypt(&verlauf[0].ciphertext, &sk)
        .unwrap();
    assert_eq!(klartext, "hello");
}

#[tokio::test]
async fn test_reihenfolge_entspricht_speicherreihenfolge() {
    let env = umgebung(&["alice", "bob", "carol"], &["general"]).await;
    let (ziel_c, mut rx_c) = ziel();
    env.hub.on_connect(&raum("general"), &user("carol"), ziel_c).await;

    let mut tasks = Vec::new();
    for (autor, anzahl) in [("alice", 10), ("bob", 10)] {
        let hub = Arc::clone(&env.hub);
        tasks.push(tokio::spawn(async move {
            for i in 0..anzahl {
                hub.route_message(&raum("general"), &user(autor), &format!("{autor}-{i}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    let mut empfangen = Vec::new();
    while let Ok(z) = rx_c.try_recv() {
        empfangen.push(z.message_id);
    }

    let gespeichert: Vec<_> = env
        .store
        .history_of(&raum("general"), 100)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();

    assert_eq!(empfangen.len(), 20);
    assert_eq!(empfangen, gespeichert);
}

#[tokio::test]
async fn test_nachrichten_eines_autors_bleiben_in_reihenfolge() {
    let env = umgebung(&["alice", "bob"], &["general"]).await;
    let (ziel_b, mut rx_b) = ziel();
    env.hub.on_connect(&raum("general"), &user("bob"), ziel_b).await;

    for i in 0..5 {
        env.hub
            .route_message(&raum("general"), &user("alice"), &format!("m{i}"))
            .await
            .unwrap();
    }

    for i in 0..5 {
        assert_eq!(rx_b.recv().await.unwrap().message, format!("m{i}"));
    }
}

#[tokio::test]
async fn test_fehlender_schluessel() {
    let env = umgebung(&["bob"], &["general"]).await;
    let (ziel_b, mut rx_b) = ziel();
    env.hub.on_connect(&raum("general"), &user("bob"), ziel_b).await;

    let err = env
        .hub
        .route_message(&raum("general"), &user("mallory"), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::SchluesselNichtGefunden(ref id) if id == "mallory"));

    assert_eq!(env.store.anzahl_nachrichten(), 0);
    assert!(rx_b.try_recv().is_err());
    assert_eq!(env.hub.statistik().schluessel_fehler, 1);
}

#[tokio::test]
async fn test_unbekannter_raum_ist_persistenzfehler() {
    let env = umgebung(&["alice"], &[]).await;
    let (ziel_a, mut rx_a) = ziel();
    env.hub.on_connect(&raum("nirgendwo"), &user("alice"), ziel_a).await;

    let err = env
        .hub
        .route_message(&raum("nirgendwo"), &user("alice"), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Persistenz(_)));
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn test_persistenzfehler_isoliert_raeume() {
    let mut store = TestStore::neu();
    store.fehlerhafter_raum = Some(raum("kaputt"));
    let store = Arc::new(store);
    store.create_room(&raum("kaputt")).await.unwrap();
    store.create_room(&raum("heil")).await.unwrap();

    let hub = test_store_hub(store.clone(), &["alice", "bob"]).await;
    let (ziel_k, mut rx_k) = ziel();
    let (ziel_h, mut rx_h) = ziel();
    hub.on_connect(&raum("kaputt"), &user("bob"), ziel_k).await;
    hub.on_connect(&raum("heil"), &user("bob"), ziel_h).await;

    let err = hub
        .route_message(&raum("kaputt"), &user("alice"), "weg")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Persistenz(_)));
    assert!(rx_k.try_recv().is_err());

    hub.route_message(&raum("heil"), &user("alice"), "da")
        .await
        .unwrap();
    assert_eq!(rx_h.recv().await.unwrap().message, "da");

    // Die Pipeline des kaputten Raums lebt weiter
    assert!(hub
        .route_message(&raum("kaputt"), &user("alice"), "nochmal")
        .await
        .is_err());
    assert_eq!(hub.statistik().persistenz_fehler, 2);
}

#[tokio::test]
async fn test_blockierter_raum_haelt_andere_nicht_auf() {
    let mut store = TestStore::neu();
    store.blockierter_raum = Some(raum("langsam"));
    let store = Arc::new(store);
    store.create_room(&raum("langsam")).await.unwrap();
    store.create_room(&raum("schnell")).await.unwrap();

    let hub = test_store_hub(store.clone(), &["alice"]).await;

    let hub_langsam = Arc::clone(&hub);
    let langsam = tokio::spawn(async move {
        hub_langsam
            .route_message(&raum("langsam"), &user("alice"), "eins")
            .await
    });
    store.angekommen.notified().await;

    let schnell = tokio::time::timeout(
        Duration::from_secs(2),
        hub.route_message(&raum("schnell"), &user("alice"), "zwei"),
    )
    .await
    .expect("Raum 'schnell' wurde blockiert");
    assert!(schnell.is_ok());
    assert!(!langsam.is_finished());

    store.freigabe.notify_one();
    assert!(langsam.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_abgebrochener_absender_bricht_nachricht_nicht_ab() {
    let mut store = TestStore::neu();
    store.blockierter_raum = Some(raum("general"));
    let store = Arc::new(store);
    store.create_room(&raum("general")).await.unwrap();

    let hub = test_store_hub(store.clone(), &["alice", "bob"]).await;
    let (ziel_b, mut rx_b) = ziel();
    hub.on_connect(&raum("general"), &user("bob"), ziel_b).await;

    let hub_alice = Arc::clone(&hub);
    let absender = tokio::spawn(async move {
        hub_alice
            .route_message(&raum("general"), &user("alice"), "trotzdem")
            .await
    });
    store.angekommen.notified().await;

    // Absender trennt waehrend die Nachricht gespeichert wird
    absender.abort();
    assert!(absender.await.unwrap_err().is_cancelled());
    store.freigabe.notify_one();

    let zustellung = tokio::time::timeout(Duration::from_secs(2), rx_b.recv())
        .await
        .expect("Nachricht wurde nicht zugestellt")
        .unwrap();
    assert_eq!(zustellung.message, "trotzdem");
    assert_eq!(store.inner.anzahl_nachrichten(), 1);
}

#[tokio::test]
async fn test_trennen_entfernt_mitglied() {
    let env = umgebung(&["alice", "bob"], &["general"]).await;
    let (ziel_b, mut rx_b) = ziel();
    let session_b = ziel_b.session_id;
    env.hub.on_connect(&raum("general"), &user("bob"), ziel_b).await;
    assert_eq!(env.store.roster_of(&raum("general")).await.unwrap(), vec![user("bob")]);

    assert!(env.hub.on_disconnect(&raum("general"), &user("bob"), session_b).await);
    assert!(env.hub.members_of(&raum("general")).is_empty());
    assert!(env.store.roster_of(&raum("general")).await.unwrap().is_empty());

    env.hub
        .route_message(&raum("general"), &user("alice"), "niemand da")
        .await
        .unwrap();
    assert!(rx_b.recv().await.is_none());

    // Zweites Trennen ist wirkungslos
    assert!(!env.hub.on_disconnect(&raum("general"), &user("bob"), session_b).await);
}

#[tokio::test]
async fn test_neue_sitzung_ersetzt_alte() {
    let env = umgebung(&["alice", "bob"], &["general"]).await;
    let (alt, mut rx_alt) = ziel();
    let alte_id = alt.session_id;
    let (neu, mut rx_neu) = ziel();

    env.hub.on_connect(&raum("general"), &user("bob"), alt).await;
    env.hub.on_connect(&raum("general"), &user("bob"), neu).await;
    assert_eq!(env.hub.members_of(&raum("general")), vec![user("bob")]);
    assert_eq!(env.hub.statistik().verbundene_sitzungen, 1);

    // Die alte Sitzung darf die neue nicht abmelden
    assert!(!env.hub.on_disconnect(&raum("general"), &user("bob"), alte_id).await);
    assert_eq!(env.hub.members_of(&raum("general")), vec![user("bob")]);

    env.hub
        .route_message(&raum("general"), &user("alice"), "an die neue")
        .await
        .unwrap();
    assert_eq!(rx_neu.recv().await.unwrap().message, "an die neue");
    assert!(rx_alt.recv().await.is_none());
}

#[tokio::test]
async fn test_ungueltige_eingabe() {
    let env = umgebung(&["alice"], &["general"]).await;
    let zu_lang = "x".repeat(HubKonfiguration::default().max_nachrichten_laenge + 1);

    for text in ["", "   \n\t", zu_lang.as_str()] {
        let err = env
            .hub
            .route_message(&raum("general"), &user("alice"), text)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::UngueltigeEingabe(_)));
    }
    assert_eq!(env.store.anzahl_nachrichten(), 0);
    assert_eq!(env.hub.statistik().aktive_pipelines, 0);
}

#[tokio::test]
async fn test_laenge_zaehlt_zeichen_nicht_bytes() {
    let env = umgebung(&["alice"], &["general"]).await;
    let max = HubKonfiguration::default().max_nachrichten_laenge;
    let umlaute = "ä".repeat(max);

    assert!(env
        .hub
        .route_message(&raum("general"), &user("alice"), &umlaute)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_verlauf_entschluesselt() {
    let env = umgebung(&["alice", "bob"], &["general"]).await;
    env.hub
        .route_message(&raum("general"), &user("alice"), "erste")
        .await
        .unwrap();
    env.hub
        .route_message(&raum("general"), &user("bob"), "zweite")
        .await
        .unwrap();

    let verlauf = env.hub.history(&raum("general"), 50).await.unwrap();
    let paare: Vec<(&str, &str)> = verlauf
        .iter()
        .map(|e| (e.username.as_str(), e.message.as_str()))
        .collect();
    assert_eq!(paare, vec![("alice", "erste"), ("bob", "zweite")]);
}

#[tokio::test]
async fn test_verlauf_ueberspringt_eintraege_ohne_schluessel() {
    let env = umgebung(&["alice", "bob"], &["general"]).await;
    env.hub
        .route_message(&raum("general"), &user("alice"), "von alice")
        .await
        .unwrap();
    env.hub
        .route_message(&raum("general"), &user("bob"), "von bob")
        .await
        .unwrap();

    env.keys.remove(&user("alice"));

    let verlauf = env.hub.history(&raum("general"), 50).await.unwrap();
    assert_eq!(verlauf.len(), 1);
    assert_eq!(verlauf[0].username, "bob");
}

#[tokio::test]
async fn test_statistik() {
    let env = umgebung(&["alice", "bob"], &["general", "random"]).await;
    let (ziel_b, _rx_b) = ziel();
    env.hub.on_connect(&raum("general"), &user("bob"), ziel_b).await;

    env.hub
        .route_message(&raum("general"), &user("alice"), "a")
        .await
        .unwrap();
    env.hub
        .route_message(&raum("random"), &user("alice"), "b")
        .await
        .unwrap();

    let stat = env.hub.statistik();
    assert_eq!(stat.nachrichten_geroutet, 2);
    assert_eq!(stat.zustellungen, 1);
    assert_eq!(stat.verbundene_sitzungen, 1);
    assert_eq!(stat.aktive_pipelines, 2);
}

#[tokio::test]
async fn test_volle_queue_verwirft_zustellung() {
    let env = umgebung(&["alice", "bob"], &["general"]).await;
    let (tx, mut rx) = mpsc::channel(1);
    let ziel_b = Zustellziel {
        session_id: SessionId::new(),
        tx,
    };
    env.hub.on_connect(&raum("general"), &user("bob"), ziel_b).await;

    for text in ["eins", "zwei"] {
        env.hub
            .route_message(&raum("general"), &user("alice"), text)
            .await
            .unwrap();
    }

    assert_eq!(rx.recv().await.unwrap().message, "eins");
    assert!(rx.try_recv().is_err());
    assert_eq!(env.hub.statistik().verworfene_zustellungen, 1);
    // Gespeichert wird trotzdem
    assert_eq!(env.store.anzahl_nachrichten(), 2);
}

// ---------------------------------------------------------------------------
// Entschluesselungsfehler beim Verteilen
// ---------------------------------------------------------------------------

/// Cipher dessen n-ter Aufruf von `decrypt` fehlschlaegt
struct StoerCipher {
    inner: SealedBoxCipher,
    aufrufe: AtomicUsize,
    fehler_bei: usize,
}

impl CipherEngine for StoerCipher {
    fn encrypt(&self, plaintext: &str, public_key: &PublicKey) -> CryptoResult<Vec<u8>> {
        self.inner.encrypt(plaintext, public_key)
    }

    fn decrypt(&self, ciphertext: &[u8], private_key: &SecretBytes) -> CryptoResult<String> {
        if self.aufrufe.fetch_add(1, Ordering::SeqCst) == self.fehler_bei {
            return Err(CryptoError::Entschluesselung("Tag ungueltig".into()));
        }
        self.inner.decrypt(ciphertext, private_key)
    }
}

#[tokio::test]
async fn test_entschluesselungsfehler_ueberspringt_nur_ein_mitglied() {
    let keys = Arc::new(MemoryKeyStore::new());
    let store = Arc::new(MemoryStore::new());
    for name in ["alice", "bob", "carol"] {
        keys.ensure_key_pair(&user(name)).await.unwrap();
    }
    store.create_room(&raum("general")).await.unwrap();

    // Mitglieder werden sortiert verteilt: der erste Aufruf trifft alice
    let cipher = Arc::new(StoerCipher {
        inner: SealedBoxCipher::default(),
        aufrufe: AtomicUsize::new(0),
        fehler_bei: 0,
    });
    let hub = Hub::neu(keys, cipher, store.clone(), HubKonfiguration::default());

    let (ziel_a, mut rx_a) = ziel();
    let (ziel_b, mut rx_b) = ziel();
    let (ziel_c, mut rx_c) = ziel();
    hub.on_connect(&raum("general"), &user("alice"), ziel_a).await;
    hub.on_connect(&raum("general"), &user("bob"), ziel_b).await;
    hub.on_connect(&raum("general"), &user("carol"), ziel_c).await;

    hub.route_message(&raum("general"), &user("bob"), "eins")
        .await
        .expect("Nachricht muss trotz Entschluesselungsfehler angenommen werden");

    assert_eq!(rx_b.recv().await.unwrap().message, "eins");
    assert_eq!(rx_c.recv().await.unwrap().message, "eins");
    assert!(rx_a.try_recv().is_err());
    assert_eq!(store.anzahl_nachrichten(), 1);

    let stat = hub.statistik();
    assert_eq!(stat.entschluesselungs_fehler, 1);
    assert_eq!(stat.zustellungen, 2);

    // Die Pipeline des Raums laeuft weiter
    hub.route_message(&raum("general"), &user("bob"), "zwei")
        .await
        .unwrap();
    for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
        assert_eq!(rx.recv().await.unwrap().message, "zwei");
    }
    assert_eq!(store.anzahl_nachrichten(), 2);
    assert_eq!(hub.statistik().entschluesselungs_fehler, 1);
}

// ---------------------------------------------------------------------------
// Abbau leerlaufender Pipelines
// ---------------------------------------------------------------------------

async fn hub_mit_kurzem_leerlauf(benutzer: &[&str], raeume: &[&str]) -> Arc<Hub> {
    let keys = Arc::new(MemoryKeyStore::new());
    let store = Arc::new(MemoryStore::new());
    for name in benutzer {
        keys.ensure_key_pair(&user(name)).await.unwrap();
    }
    for slug in raeume {
        store.create_room(&raum(slug)).await.unwrap();
    }
    let config = HubKonfiguration {
        pipeline_leerlauf: Duration::from_millis(20),
        ..HubKonfiguration::default()
    };
    Hub::neu(keys, Arc::new(SealedBoxCipher::default()), store, config)
}

async fn warten_auf_pipelines(hub: &Hub, anzahl: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while hub.statistik().aktive_pipelines != anzahl {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Pipelines nicht abgebaut");
}

#[tokio::test]
async fn test_leere_raeume_bauen_pipeline_ab() {
    let hub = hub_mit_kurzem_leerlauf(&["alice"], &["a", "b", "c"]).await;

    for slug in ["a", "b", "c"] {
        hub.route_message(&raum(slug), &user("alice"), "hallo")
            .await
            .unwrap();
    }
    assert_eq!(hub.statistik().aktive_pipelines, 3);

    warten_auf_pipelines(&hub, 0).await;

    // Der naechste Auftrag startet die Pipeline neu
    hub.route_message(&raum("a"), &user("alice"), "wieder da")
        .await
        .unwrap();
    assert_eq!(hub.statistik().aktive_pipelines, 1);
    assert_eq!(hub.statistik().nachrichten_geroutet, 4);
}

#[tokio::test]
async fn test_pipeline_mit_mitgliedern_bleibt() {
    let hub = hub_mit_kurzem_leerlauf(&["alice"], &["general", "leer"]).await;
    let (ziel_a, mut rx_a) = ziel();
    hub.on_connect(&raum("general"), &user("alice"), ziel_a).await;

    hub.route_message(&raum("general"), &user("alice"), "eins")
        .await
        .unwrap();
    hub.route_message(&raum("leer"), &user("alice"), "zwei")
        .await
        .unwrap();

    warten_auf_pipelines(&hub, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hub.statistik().aktive_pipelines, 1);

    hub.route_message(&raum("general"), &user("alice"), "drei")
        .await
        .unwrap();
    assert_eq!(rx_a.recv().await.unwrap().message, "eins");
    assert_eq!(rx_a.recv().await.unwrap().message, "drei");
}
