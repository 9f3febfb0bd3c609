//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use serde::{Deserialize, Serialize};

/// Laenge eines X25519-Schluessels in Bytes
pub const X25519_SCHLUESSEL_LAENGE: usize = 32;

/// Ein kryptografisches Schluessel-Paar (oeffentlich + privat)
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Oeffentlicher Schluessel (32 Bytes X25519)
    pub public_key: PublicKey,
    /// Privater Schluessel (32 Bytes X25519)
    pub private_key: SecretBytes,
}

/// Oeffentlicher Schluessel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub bytes: Vec<u8>,
}

impl PublicKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Gibt den Schluessel als festes X25519-Array zurueck
    pub fn als_x25519(&self) -> Option<[u8; X25519_SCHLUESSEL_LAENGE]> {
        self.bytes.as_slice().try_into().ok()
    }
}

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone)]
pub struct SecretBytes(pub Vec<u8>);

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// AEAD-Algorithmus fuer verschluesselte Nachrichten
///
/// Die Kennung wird als erstes Byte jeder verschluesselten Nachricht
/// abgelegt, damit alte Nachrichten nach einem Wechsel lesbar bleiben.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CipherAlgorithm {
    #[default]
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl CipherAlgorithm {
    /// Kennung im Nachrichten-Header
    pub fn kennung(self) -> u8 {
        match self {
            Self::Aes256Gcm => 1,
            Self::ChaCha20Poly1305 => 2,
        }
    }

    pub fn aus_kennung(kennung: u8) -> Option<Self> {
        match kennung {
            1 => Some(Self::Aes256Gcm),
            2 => Some(Self::ChaCha20Poly1305),
            _ => None,
        }
    }
}
