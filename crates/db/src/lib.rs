//! kryptochat-db – Persistenz fuer Kryptochat
//!
//! Dieses Crate stellt das `MessageStore`-Trait bereit und implementiert es
//! fuer SQLite (sqlx, Migrationen, WAL) sowie als In-Memory-Ablage.
//! Gespeichert werden Raeume, Mitgliederlisten und ausschliesslich
//! verschluesselte Nachrichten.

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use memory::MemoryStore;
pub use models::{NachrichtRecord, NeueNachricht};
pub use repository::{DatabaseConfig, DbResult, MessageStore};
pub use sqlite::SqliteDb;
