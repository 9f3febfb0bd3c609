//! In-Memory-Schluesselablage (Tests und Einzelprozess-Betrieb)

use async_trait::async_trait;
use dashmap::DashMap;
use kryptochat_core::Username;

use crate::cipher::generate_key_pair;
use crate::error::{CryptoError, CryptoResult};
use crate::keystore::KeyStore;
use crate::types::{KeyPair, PublicKey, SecretBytes};

/// Schluesselpaare im Speicher, indiziert nach Benutzername
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    paare: DashMap<Username, KeyPair>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anzahl der abgelegten Schluesselpaare
    pub fn len(&self) -> usize {
        self.paare.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paare.is_empty()
    }

    /// Entfernt das Schluesselpaar einer Identitaet
    pub fn remove(&self, identitaet: &Username) -> bool {
        self.paare.remove(identitaet).is_some()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn public_key_of(&self, identitaet: &Username) -> CryptoResult<PublicKey> {
        self.paare
            .get(identitaet)
            .map(|paar| paar.public_key.clone())
            .ok_or_else(|| CryptoError::kein_schluessel(identitaet))
    }

    async fn private_key_of(&self, identitaet: &Username) -> CryptoResult<SecretBytes> {
        self.paare
            .get(identitaet)
            .map(|paar| paar.private_key.clone())
            .ok_or_else(|| CryptoError::kein_schluessel(identitaet))
    }

    async fn put(&self, identitaet: &Username, paar: KeyPair) -> CryptoResult<()> {
        self.paare.insert(identitaet.clone(), paar);
        Ok(())
    }

    async fn contains(&self, identitaet: &Username) -> CryptoResult<bool> {
        Ok(self.paare.contains_key(identitaet))
    }

    async fn ensure_key_pair(&self, identitaet: &Username) -> CryptoResult<bool> {
        // Entry-API: kein Wettlauf zwischen contains und put
        let mut erzeugt = false;
        self.paare.entry(identitaet.clone()).or_insert_with(|| {
            erzeugt = true;
            generate_key_pair()
        });
        if erzeugt {
            tracing::debug!(identitaet = %identitaet, "Schluesselpaar im Speicher erzeugt");
        }
        Ok(erzeugt)
    }
}
