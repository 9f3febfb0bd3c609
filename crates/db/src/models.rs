//! Datenbankmodelle fuer Kryptochat
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank. Nachrichten
//! liegen ausschliesslich verschluesselt vor; der Klartext verlaesst den
//! Chat-Kern nie in Richtung Persistenz.

use chrono::{DateTime, Utc};
use kryptochat_core::{MessageId, RoomSlug, Username};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Verschluesselte Nachricht wie sie abgelegt wird
///
/// Unveraenderlich nach dem Anhaengen. `seq` gibt die Anhaenge-Reihenfolge
/// wieder und ist innerhalb eines Raums streng monoton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NachrichtRecord {
    pub id: MessageId,
    pub seq: i64,
    pub room: RoomSlug,
    pub author: Username,
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Anhaengen einer neuen Nachricht
#[derive(Debug, Clone)]
pub struct NeueNachricht {
    pub room: RoomSlug,
    pub author: Username,
    pub ciphertext: Vec<u8>,
}
