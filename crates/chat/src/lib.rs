//! kryptochat-chat – Raum-Mitgliedschaft und Nachrichten-Pipeline
//!
//! Dieses Crate implementiert:
//! - RoomRegistry: wer ist in welchem Raum
//! - Hub: verschluesseln, speichern und verteilen pro Raum
//! - ConnectionSession: eine Sitzung pro Socket mit eigener Zustell-Queue
//! - Frames: JSON-Format zwischen Client und Sitzung
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use kryptochat_chat::{ConnectionSession, Hub, HubKonfiguration, SessionOptionen};
//! use kryptochat_core::{RoomSlug, Username};
//! use kryptochat_crypto::{KeyStore, MemoryKeyStore, SealedBoxCipher};
//! use kryptochat_db::{MemoryStore, MessageStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let keys = Arc::new(MemoryKeyStore::new());
//!     let store = Arc::new(MemoryStore::new());
//!     let raum = RoomSlug::parse("general").unwrap();
//!     let alice = Username::parse("alice").unwrap();
//!     keys.ensure_key_pair(&alice).await.unwrap();
//!     store.create_room(&raum).await.unwrap();
//!
//!     let hub = Hub::neu(keys, Arc::new(SealedBoxCipher::default()), store, HubKonfiguration::default());
//!     let mut session = ConnectionSession::verbinden(hub, raum, alice, SessionOptionen::default()).await;
//!     session.on_frame(r#"{"message":"hello"}"#).await;
//!     let frame = session.naechster_frame().await;
//! }
//! ```

pub mod error;
pub mod frames;
pub mod hub;
pub mod registry;
pub mod session;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use frames::{AusgabeFormat, AusgehenderFrame, EingehenderFrame};
pub use hub::{Hub, HubKonfiguration, HubStatistik, VerlaufsEintrag, Zustellung, Zustellziel};
pub use registry::RoomRegistry;
pub use session::{ConnectionSession, SessionOptionen, SessionZustand};
