//! Schluesselablage (KeyStore)
//!
//! Bildet Benutzer-Identitaeten auf X25519-Schluesselpaare ab. Aus Sicht des
//! Chat-Kerns ist die Ablage nur lesend; die Bereitstellung (`ensure_key_pair`)
//! passiert bei der Registrierung bzw. beim Serverstart.
//!
//! Implementierungen muessen gleichzeitige Lesezugriffe aus vielen Raeumen
//! erlauben.

pub mod directory;
pub mod memory;

use async_trait::async_trait;
use kryptochat_core::Username;

use crate::cipher::generate_key_pair;
use crate::error::CryptoResult;
use crate::types::{KeyPair, PublicKey, SecretBytes};

pub use directory::DirectoryKeyStore;
pub use memory::MemoryKeyStore;

/// Abstrakte Schluesselablage pro Identitaet
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Oeffentlicher Schluessel einer Identitaet (`KeinSchluessel` falls unbekannt)
    async fn public_key_of(&self, identitaet: &Username) -> CryptoResult<PublicKey>;

    /// Privater Schluessel einer Identitaet (`KeinSchluessel` falls unbekannt)
    async fn private_key_of(&self, identitaet: &Username) -> CryptoResult<SecretBytes>;

    /// Legt ein Schluesselpaar ab (ueberschreibt ein vorhandenes)
    async fn put(&self, identitaet: &Username, paar: KeyPair) -> CryptoResult<()>;

    /// Prueft ob fuer die Identitaet ein Schluesselpaar existiert
    async fn contains(&self, identitaet: &Username) -> CryptoResult<bool>;

    /// Stellt sicher dass ein Schluesselpaar existiert (idempotent)
    ///
    /// Gibt `true` zurueck wenn ein neues Paar erzeugt wurde.
    async fn ensure_key_pair(&self, identitaet: &Username) -> CryptoResult<bool> {
        if self.contains(identitaet).await? {
            return Ok(false);
        }
        self.put(identitaet, generate_key_pair()).await?;
        tracing::info!(identitaet = %identitaet, "Schluesselpaar erzeugt");
        Ok(true)
    }
}
