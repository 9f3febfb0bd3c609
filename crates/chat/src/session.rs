//! ConnectionSession – eine Sitzung pro Socket
//!
//! Bindet genau ein `(Raum, Benutzer)`-Paar an den Hub. Eingehende Frames
//! werden geparst und an `Hub::route_message` weitergegeben, Zustellungen
//! aus der eigenen Queue werden als ausgehende Frames formatiert.
//!
//! Zustandsuebergaenge: `Verbindend -> Beigetreten -> Getrennt`

use std::sync::Arc;

use kryptochat_core::{RoomSlug, SessionId, Username};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::frames::{AusgabeFormat, AusgehenderFrame, EingehenderFrame};
use crate::hub::{Hub, Zustellung, Zustellziel};

/// Lebenszyklus einer Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    Verbindend,
    Beigetreten,
    Getrennt,
}

/// Optionen pro Sitzung
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptionen {
    pub format: AusgabeFormat,
}

/// Verbindung eines Benutzers mit einem Raum
pub struct ConnectionSession {
    id: SessionId,
    hub: Arc<Hub>,
    room: RoomSlug,
    user: Username,
    optionen: SessionOptionen,
    rx: mpsc::Receiver<Zustellung>,
    zustand: SessionZustand,
}

impl ConnectionSession {
    /// Erstellt die Sitzung und tritt dem Raum bei
    pub async fn verbinden(
        hub: Arc<Hub>,
        room: RoomSlug,
        user: Username,
        optionen: SessionOptionen,
    ) -> Self {
        let (tx, rx) = mpsc::channel(hub.konfiguration().sende_queue_groesse);
        let mut session = Self {
            id: SessionId::new(),
            hub,
            room,
            user,
            optionen,
            rx,
            zustand: SessionZustand::Verbindend,
        };

        let ziel = Zustellziel {
            session_id: session.id,
            tx,
        };
        session
            .hub
            .on_connect(&session.room, &session.user, ziel)
            .await;
        session.zustand = SessionZustand::Beigetreten;
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn room(&self) -> &RoomSlug {
        &self.room
    }

    pub fn user(&self) -> &Username {
        &self.user
    }

    pub fn zustand(&self) -> SessionZustand {
        self.zustand
    }

    /// Verarbeitet einen rohen Text-Frame vom Client
    ///
    /// Ungueltige Frames werden geloggt und verworfen (`None`), die Sitzung
    /// bleibt bestehen. Schlaegt das Senden fehl, bekommt der Autor einen
    /// Fehler-Frame.
    pub async fn on_frame(&self, raw: &str) -> Option<AusgehenderFrame> {
        if self.zustand != SessionZustand::Beigetreten {
            return Some(AusgehenderFrame::fehler("Sitzung ist nicht verbunden"));
        }

        let frame = match EingehenderFrame::parsen(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %self.id, user = %self.user, fehler = %e, "Frame verworfen");
                return None;
            }
        };

        match self
            .hub
            .route_message(&self.room, &self.user, &frame.message)
            .await
        {
            Ok(message_id) => {
                debug!(session_id = %self.id, message_id = %message_id, "Nachricht verteilt");
                None
            }
            Err(e) => Some(AusgehenderFrame::fehler(e.to_string())),
        }
    }

    /// Formatiert eine Zustellung als ausgehenden Frame
    pub fn deliver(&self, zustellung: Zustellung) -> AusgehenderFrame {
        let username = zustellung.author.to_string();
        AusgehenderFrame::Nachricht {
            message: self.optionen.format.rendern(&username, &zustellung.message),
            username,
        }
    }

    /// Wartet auf die naechste Zustellung
    ///
    /// `None` sobald die Sitzung abgemeldet oder ersetzt wurde.
    pub async fn naechster_frame(&mut self) -> Option<AusgehenderFrame> {
        let zustellung = self.rx.recv().await?;
        Some(self.deliver(zustellung))
    }

    /// Meldet die Sitzung beim Hub ab (idempotent)
    pub async fn trennen(&mut self) {
        if self.zustand != SessionZustand::Beigetreten {
            return;
        }
        self.zustand = SessionZustand::Getrennt;
        self.rx.close();
        self.hub.on_disconnect(&self.room, &self.user, self.id).await;
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        if self.zustand != SessionZustand::Beigetreten {
            return;
        }
        self.zustand = SessionZustand::Getrennt;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(session_id = %self.id, user = %self.user, "Keine Runtime, Abmeldung entfaellt");
            return;
        };

        let hub = Arc::clone(&self.hub);
        let room = self.room.clone();
        let user = self.user.clone();
        let id = self.id;
        handle.spawn(async move {
            hub.on_disconnect(&room, &user, id).await;
        });
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("room", &self.room)
            .field("user", &self.user)
            .field("zustand", &self.zustand)
            .finish()
    }
}
