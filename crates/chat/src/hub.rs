//! Hub – Nachrichten-Pipeline und Verteilung pro Raum
//!
//! Jeder Raum bekommt beim ersten Senden eine eigene Pipeline: einen Worker-Task
//! mit begrenzter Auftrags-Queue. Der Worker arbeitet die Auftraege streng
//! nacheinander ab:
//!
//! 1. Schluessel des Autors laden
//! 2. Klartext verschluesseln
//! 3. Ciphertext speichern
//! 4. An alle aktuellen Mitglieder entschluesselt zustellen
//!
//! Damit entspricht die Reihenfolge in einem Raum der Annahme-Reihenfolge,
//! und eine Nachricht wird erst zugestellt wenn sie gespeichert ist. Raeume
//! laufen unabhaengig voneinander. Das Ergebnis geht per oneshot an den
//! Absender zurueck; trennt dieser vorher, laeuft der Auftrag trotzdem zu Ende.
//!
//! Eine Pipeline ohne Auftraege beendet sich nach `pipeline_leerlauf`, sofern
//! der Raum keine Mitglieder hat und niemand mehr einen Sender haelt. Der
//! naechste Auftrag startet sie neu.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kryptochat_core::{MessageId, RoomSlug, SessionId, Username};
use kryptochat_crypto::{CipherEngine, KeyStore, SecretBytes};
use kryptochat_db::{MessageStore, NeueNachricht};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{ChatError, ChatResult};
use crate::registry::RoomRegistry;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Laufzeit-Parameter des Hubs
#[derive(Debug, Clone)]
pub struct HubKonfiguration {
    /// Groesse der Auftrags-Queue pro Raum
    pub raum_queue_groesse: usize,
    /// Groesse der Zustell-Queue pro Sitzung
    pub sende_queue_groesse: usize,
    /// Maximale Nachrichtenlaenge in Zeichen
    pub max_nachrichten_laenge: usize,
    /// Leerlauf nach dem eine Raum-Pipeline ohne Mitglieder beendet wird
    pub pipeline_leerlauf: Duration,
}

impl Default for HubKonfiguration {
    fn default() -> Self {
        Self {
            raum_queue_groesse: 64,
            sende_queue_groesse: 64,
            max_nachrichten_laenge: 4096,
            pipeline_leerlauf: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Zustellung
// ---------------------------------------------------------------------------

/// Entschluesselte Nachricht fuer genau ein Mitglied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zustellung {
    pub message_id: MessageId,
    pub room: RoomSlug,
    pub author: Username,
    pub message: String,
}

/// Zustell-Queue einer Sitzung fuer ein `(Raum, Benutzer)`-Paar
#[derive(Debug, Clone)]
pub struct Zustellziel {
    pub session_id: SessionId,
    pub tx: mpsc::Sender<Zustellung>,
}

impl Zustellziel {
    /// Stellt nicht-blockierend zu
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    fn senden(&self, zustellung: Zustellung) -> bool {
        match self.tx.try_send(zustellung) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %self.session_id, "Zustell-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session_id = %self.session_id, "Zustell-Queue geschlossen (Sitzung beendet)");
                false
            }
        }
    }
}

/// Eintrag des entschluesselten Verlaufs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerlaufsEintrag {
    pub username: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Zaehler {
    geroutet: AtomicU64,
    persistenz_fehler: AtomicU64,
    schluessel_fehler: AtomicU64,
    entschluesselungs_fehler: AtomicU64,
    zustellungen: AtomicU64,
    verworfene_zustellungen: AtomicU64,
    verbundene_sitzungen: AtomicU64,
}

fn inc(zaehler: &AtomicU64) {
    zaehler.fetch_add(1, Ordering::Relaxed);
}

/// Momentaufnahme der Hub-Zaehler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStatistik {
    pub nachrichten_geroutet: u64,
    pub persistenz_fehler: u64,
    pub schluessel_fehler: u64,
    pub entschluesselungs_fehler: u64,
    pub zustellungen: u64,
    pub verworfene_zustellungen: u64,
    pub verbundene_sitzungen: u64,
    pub aktive_pipelines: u64,
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

struct Auftrag {
    author: Username,
    plaintext: String,
    antwort: oneshot::Sender<ChatResult<MessageId>>,
}

/// Auftrags-Queue eines Raums mit Kennung des zugehoerigen Workers
struct Pipeline {
    id: u64,
    tx: mpsc::Sender<Auftrag>,
}

/// Zustand den Hub und Raum-Worker teilen
struct Shared {
    registry: RoomRegistry,
    ziele: DashMap<(RoomSlug, Username), Zustellziel>,
    pipelines: DashMap<RoomSlug, Pipeline>,
    naechste_pipeline: AtomicU64,
    keystore: Arc<dyn KeyStore>,
    cipher: Arc<dyn CipherEngine>,
    store: Arc<dyn MessageStore>,
    zaehler: Zaehler,
}

/// Zentrale Verteilstelle fuer alle Raeume
///
/// Wird als `Arc<Hub>` von allen Sitzungen geteilt.
pub struct Hub {
    shared: Arc<Shared>,
    config: HubKonfiguration,
}

impl Hub {
    /// Erstellt einen neuen Hub
    pub fn neu(
        keystore: Arc<dyn KeyStore>,
        cipher: Arc<dyn CipherEngine>,
        store: Arc<dyn MessageStore>,
        config: HubKonfiguration,
    ) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(Shared {
                registry: RoomRegistry::neu(),
                ziele: DashMap::new(),
                pipelines: DashMap::new(),
                naechste_pipeline: AtomicU64::new(0),
                keystore,
                cipher,
                store,
                zaehler: Zaehler::default(),
            }),
            config,
        })
    }

    pub fn konfiguration(&self) -> &HubKonfiguration {
        &self.config
    }

    pub fn keystore(&self) -> &Arc<dyn KeyStore> {
        &self.shared.keystore
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.shared.store
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.shared.registry
    }

    /// Aktuelle Mitglieder eines Raums
    pub fn members_of(&self, room: &RoomSlug) -> Vec<Username> {
        self.shared.registry.members_of(room)
    }

    /// Verschluesselt, speichert und verteilt eine Nachricht
    ///
    /// Kehrt zurueck sobald die Raum-Pipeline den Auftrag abgeschlossen hat.
    pub async fn route_message(
        &self,
        room: &RoomSlug,
        author: &Username,
        plaintext: &str,
    ) -> ChatResult<MessageId> {
        self.eingabe_pruefen(plaintext)?;

        let (antwort, empfang) = oneshot::channel();
        let auftrag = Auftrag {
            author: author.clone(),
            plaintext: plaintext.to_string(),
            antwort,
        };

        let tx = self.raum_pipeline(room);
        if tx.send(auftrag).await.is_err() {
            // Worker beendet: Eintrag verwerfen, der naechste Auftrag startet neu
            self.shared
                .pipelines
                .remove_if(room, |_, p| p.tx.same_channel(&tx));
            return Err(ChatError::RaumGeschlossen(room.to_string()));
        }

        empfang
            .await
            .map_err(|_| ChatError::RaumGeschlossen(room.to_string()))?
    }

    fn eingabe_pruefen(&self, plaintext: &str) -> ChatResult<()> {
        if plaintext.trim().is_empty() {
            return Err(ChatError::UngueltigeEingabe(
                "Nachrichteninhalt darf nicht leer sein".into(),
            ));
        }

        let laenge = plaintext.chars().count();
        if laenge > self.config.max_nachrichten_laenge {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Nachricht zu lang: {} Zeichen (Maximum: {})",
                laenge, self.config.max_nachrichten_laenge
            )));
        }
        Ok(())
    }

    /// Liefert die Auftrags-Queue eines Raums, startet den Worker bei Bedarf
    fn raum_pipeline(&self, room: &RoomSlug) -> mpsc::Sender<Auftrag> {
        self.shared
            .pipelines
            .entry(room.clone())
            .or_insert_with(|| {
                let id = self.shared.naechste_pipeline.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = mpsc::channel(self.config.raum_queue_groesse);
                tokio::spawn(raum_worker(
                    Arc::clone(&self.shared),
                    room.clone(),
                    id,
                    rx,
                    self.config.pipeline_leerlauf,
                ));
                Pipeline { id, tx }
            })
            .tx
            .clone()
    }

    /// Registriert eine Sitzung fuer `(room, user)` und tritt dem Raum bei
    ///
    /// Eine aeltere Sitzung desselben Paars wird ersetzt.
    pub async fn on_connect(&self, room: &RoomSlug, user: &Username, ziel: Zustellziel) {
        let session_id = ziel.session_id;
        let vorher = self
            .shared
            .ziele
            .insert((room.clone(), user.clone()), ziel);

        match vorher {
            Some(alt) => info!(
                room = %room,
                user = %user,
                alte_session = %alt.session_id,
                session_id = %session_id,
                "Aeltere Sitzung ersetzt"
            ),
            None => inc(&self.shared.zaehler.verbundene_sitzungen),
        }

        self.shared.registry.join(room, user);

        if let Err(e) = self.shared.store.add_member(room, user).await {
            warn!(room = %room, user = %user, fehler = %e, "Mitgliedschaft nicht gespeichert");
        }

        info!(room = %room, user = %user, session_id = %session_id, "Sitzung verbunden");
    }

    /// Meldet eine Sitzung ab und verlaesst den Raum
    ///
    /// Nur wirksam wenn `session_id` die aktuell registrierte Sitzung ist.
    /// Gibt `true` zurueck wenn abgemeldet wurde.
    pub async fn on_disconnect(
        &self,
        room: &RoomSlug,
        user: &Username,
        session_id: SessionId,
    ) -> bool {
        let abgemeldet = match self.shared.ziele.entry((room.clone(), user.clone())) {
            Entry::Occupied(eintrag) if eintrag.get().session_id == session_id => {
                self.shared.registry.leave(room, user);
                eintrag.remove();
                true
            }
            _ => false,
        };

        if !abgemeldet {
            debug!(room = %room, user = %user, session_id = %session_id, "Veraltete Sitzung, nichts zu tun");
            return false;
        }

        self.shared
            .zaehler
            .verbundene_sitzungen
            .fetch_sub(1, Ordering::Relaxed);

        if let Err(e) = self.shared.store.remove_member(room, user).await {
            warn!(room = %room, user = %user, fehler = %e, "Mitgliedschaft nicht entfernt");
        }

        info!(room = %room, user = %user, session_id = %session_id, "Sitzung getrennt");
        true
    }

    /// Entschluesselter Verlauf eines Raums, aelteste zuerst
    ///
    /// Eintraege die sich nicht entschluesseln lassen werden uebersprungen.
    pub async fn history(&self, room: &RoomSlug, limit: i64) -> ChatResult<Vec<VerlaufsEintrag>> {
        let records = self.shared.store.history_of(room, limit).await?;

        let mut schluessel: HashMap<Username, Option<SecretBytes>> = HashMap::new();
        let mut eintraege = Vec::with_capacity(records.len());

        for record in records {
            if !schluessel.contains_key(&record.author) {
                let key = match self.shared.keystore.private_key_of(&record.author).await {
                    Ok(key) => Some(key),
                    Err(e) => {
                        warn!(room = %room, user = %record.author, fehler = %e, "Schluessel fuer Verlauf fehlt");
                        None
                    }
                };
                schluessel.insert(record.author.clone(), key);
            }

            let Some(Some(key)) = schluessel.get(&record.author) else {
                continue;
            };

            match self.shared.cipher.decrypt(&record.ciphertext, key) {
                Ok(message) => eintraege.push(VerlaufsEintrag {
                    username: record.author.to_string(),
                    message,
                }),
                Err(e) => {
                    inc(&self.shared.zaehler.entschluesselungs_fehler);
                    warn!(room = %room, message_id = %record.id, fehler = %e, "Verlaufseintrag nicht entschluesselbar");
                }
            }
        }

        Ok(eintraege)
    }

    /// Momentaufnahme der Zaehler
    pub fn statistik(&self) -> HubStatistik {
        let z = &self.shared.zaehler;
        HubStatistik {
            nachrichten_geroutet: z.geroutet.load(Ordering::Relaxed),
            persistenz_fehler: z.persistenz_fehler.load(Ordering::Relaxed),
            schluessel_fehler: z.schluessel_fehler.load(Ordering::Relaxed),
            entschluesselungs_fehler: z.entschluesselungs_fehler.load(Ordering::Relaxed),
            zustellungen: z.zustellungen.load(Ordering::Relaxed),
            verworfene_zustellungen: z.verworfene_zustellungen.load(Ordering::Relaxed),
            verbundene_sitzungen: z.verbundene_sitzungen.load(Ordering::Relaxed),
            aktive_pipelines: self.shared.pipelines.len() as u64,
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("pipelines", &self.shared.pipelines.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Raum-Worker
// ---------------------------------------------------------------------------

async fn raum_worker(
    shared: Arc<Shared>,
    room: RoomSlug,
    id: u64,
    mut rx: mpsc::Receiver<Auftrag>,
    leerlauf: Duration,
) {
    debug!(room = %room, pipeline = id, "Raum-Pipeline gestartet");

    loop {
        let auftrag = match tokio::time::timeout(leerlauf, rx.recv()).await {
            Ok(Some(auftrag)) => auftrag,
            Ok(None) => break,
            Err(_) => {
                if shared.pipeline_abbauen(&room, id, &rx) {
                    break;
                }
                continue;
            }
        };

        let ergebnis = shared
            .verarbeiten(&room, &auftrag.author, &auftrag.plaintext)
            .await;

        if let Err(e) = &ergebnis {
            warn!(room = %room, user = %auftrag.author, fehler = %e, "Nachricht nicht verteilt");
        }

        if auftrag.antwort.send(ergebnis).is_err() {
            debug!(room = %room, user = %auftrag.author, "Absender nicht mehr verbunden");
        }
    }

    debug!(room = %room, pipeline = id, "Raum-Pipeline beendet");
}

impl Shared {
    /// Entfernt eine leerlaufende Pipeline aus dem Index
    ///
    /// Nur wenn der Raum leer ist, die Queue leer ist und der Index den
    /// einzigen Sender haelt. Unter der Index-Sperre kann kein neuer Sender
    /// entstehen, daher geht kein Auftrag verloren.
    fn pipeline_abbauen(&self, room: &RoomSlug, id: u64, rx: &mpsc::Receiver<Auftrag>) -> bool {
        if !self.registry.members_of(room).is_empty() {
            return false;
        }
        self.pipelines
            .remove_if(room, |_, p| {
                p.id == id && p.tx.strong_count() == 1 && rx.is_empty()
            })
            .is_some()
    }

    async fn verarbeiten(
        &self,
        room: &RoomSlug,
        author: &Username,
        plaintext: &str,
    ) -> ChatResult<MessageId> {
        let (public_key, private_key) = match self.schluessel_laden(author).await {
            Ok(paar) => paar,
            Err(e) => {
                inc(&self.zaehler.schluessel_fehler);
                return Err(e);
            }
        };

        let ciphertext = self.cipher.encrypt(plaintext, &public_key)?;

        let record = match self
            .store
            .append(NeueNachricht {
                room: room.clone(),
                author: author.clone(),
                ciphertext,
            })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                inc(&self.zaehler.persistenz_fehler);
                return Err(e.into());
            }
        };

        inc(&self.zaehler.geroutet);
        self.verteilen(room, author, record.id, &record.ciphertext, &private_key);
        Ok(record.id)
    }

    async fn schluessel_laden(
        &self,
        author: &Username,
    ) -> ChatResult<(kryptochat_crypto::PublicKey, SecretBytes)> {
        let public_key = self.keystore.public_key_of(author).await?;
        let private_key = self.keystore.private_key_of(author).await?;
        Ok((public_key, private_key))
    }

    /// Stellt einen gespeicherten Ciphertext allen aktuellen Mitgliedern zu
    fn verteilen(
        &self,
        room: &RoomSlug,
        author: &Username,
        message_id: MessageId,
        ciphertext: &[u8],
        private_key: &SecretBytes,
    ) {
        let mitglieder = self.registry.members_of(room);

        for mitglied in mitglieder {
            let message = match self.cipher.decrypt(ciphertext, private_key) {
                Ok(text) => text,
                Err(e) => {
                    inc(&self.zaehler.entschluesselungs_fehler);
                    warn!(room = %room, user = %mitglied, fehler = %e, "Entschluesselung fuer Mitglied fehlgeschlagen");
                    continue;
                }
            };

            let Some(ziel) = self
                .ziele
                .get(&(room.clone(), mitglied.clone()))
                .map(|z| z.value().clone())
            else {
                debug!(room = %room, user = %mitglied, "Kein Zustellziel");
                continue;
            };

            let zugestellt = ziel.senden(Zustellung {
                message_id,
                room: room.clone(),
                author: author.clone(),
                message,
            });
            if zugestellt {
                inc(&self.zaehler.zustellungen);
            } else {
                inc(&self.zaehler.verworfene_zustellungen);
            }
        }
    }
}
