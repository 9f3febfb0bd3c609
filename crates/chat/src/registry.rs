//! Raum-Mitgliedschaft (RoomRegistry)
//!
//! Pro Raum eine Mitgliedermenge hinter eigenem `RwLock`. Der `DashMap`-Index
//! wird nur gehalten um das Raum-Handle zu holen, sodass Aenderungen in
//! verschiedenen Raeumen sich nicht gegenseitig blockieren.
//!
//! Leere Raeume werden aus dem Index entfernt. Ein entfernter Raum wird als
//! `entfernt` markiert, damit ein gleichzeitiges `join` mit dem alten Handle
//! neu ansetzt statt in einen verwaisten Raum zu schreiben.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use kryptochat_core::{RoomSlug, Username};
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct Raum {
    mitglieder: BTreeSet<Username>,
    entfernt: bool,
}

type RaumHandle = Arc<RwLock<Raum>>;

/// Wer ist gerade in welchem Raum
#[derive(Debug, Default)]
pub struct RoomRegistry {
    raeume: DashMap<RoomSlug, RaumHandle>,
}

impl RoomRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    fn raum(&self, room: &RoomSlug) -> Option<RaumHandle> {
        self.raeume.get(room).map(|r| Arc::clone(r.value()))
    }

    /// Fuegt einen Benutzer hinzu (idempotent)
    ///
    /// Gibt `true` zurueck wenn der Benutzer neu im Raum ist.
    pub fn join(&self, room: &RoomSlug, user: &Username) -> bool {
        loop {
            let raum = Arc::clone(self.raeume.entry(room.clone()).or_default().value());
            let mut guard = raum.write();
            if guard.entfernt {
                // Zwischen Holen und Sperren aus dem Index entfernt
                continue;
            }
            let neu = guard.mitglieder.insert(user.clone());
            if neu {
                tracing::debug!(room = %room, user = %user, "Raum beigetreten");
            }
            return neu;
        }
    }

    /// Entfernt einen Benutzer (idempotent)
    ///
    /// Gibt `true` zurueck wenn der Benutzer Mitglied war.
    pub fn leave(&self, room: &RoomSlug, user: &Username) -> bool {
        let Some(mitglieder) = self.raum(room) else {
            return false;
        };
        let entfernt = mitglieder.write().mitglieder.remove(user);
        if entfernt {
            tracing::debug!(room = %room, user = %user, "Raum verlassen");
            self.leeren_raum_entfernen(room);
        }
        entfernt
    }

    /// Entfernt den Raum aus dem Index falls er leer ist
    ///
    /// Sperrreihenfolge immer Index vor Raum.
    fn leeren_raum_entfernen(&self, room: &RoomSlug) {
        let entfernt = self.raeume.remove_if(room, |_, raum| {
            let mut guard = raum.write();
            if guard.mitglieder.is_empty() {
                guard.entfernt = true;
                true
            } else {
                false
            }
        });
        if entfernt.is_some() {
            tracing::debug!(room = %room, "Leerer Raum entfernt");
        }
    }

    /// Momentaufnahme der Mitglieder, sortiert
    pub fn members_of(&self, room: &RoomSlug) -> Vec<Username> {
        self.raum(room)
            .map(|m| m.read().mitglieder.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn ist_mitglied(&self, room: &RoomSlug, user: &Username) -> bool {
        self.raum(room)
            .is_some_and(|m| m.read().mitglieder.contains(user))
    }

    /// Raeume mit mindestens einem Mitglied
    pub fn rooms(&self) -> Vec<RoomSlug> {
        let mut raeume: Vec<RoomSlug> = self
            .raeume
            .iter()
            .filter(|e| !e.value().read().mitglieder.is_empty())
            .map(|e| e.key().clone())
            .collect();
        raeume.sort();
        raeume
    }

    /// Anzahl der Raeume im Index
    pub fn anzahl_raeume(&self) -> usize {
        self.raeume.len()
    }
}
