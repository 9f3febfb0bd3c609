//! # kryptochat-crypto
//!
//! Schluesselablage und Nachrichten-Verschluesselung fuer Kryptochat.
//!
//! ## Module
//! - `cipher` - Asymmetrische Verschluesselung einzelner Nachrichten (X25519 + AEAD)
//! - `keystore` - Schluesselpaare pro Benutzer (Speicher oder Verzeichnis)
//! - `types` - Gemeinsame Typen (KeyPair, PublicKey, SecretBytes, Algorithmus)
//! - `error` - Fehlertypen

pub mod cipher;
pub mod error;
pub mod keystore;
pub mod types;

// Bequeme Re-Exports
pub use cipher::{generate_key_pair, CipherEngine, SealedBoxCipher};
pub use error::{CryptoError, CryptoResult};
pub use keystore::{DirectoryKeyStore, KeyStore, MemoryKeyStore};
pub use types::{CipherAlgorithm, KeyPair, PublicKey, SecretBytes};
