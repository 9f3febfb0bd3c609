//! Nachrichten-Verschluesselung (CipherEngine)
//!
//! Jede Chat-Nachricht wird einzeln mit einem oeffentlichen X25519-Schluessel
//! verschluesselt. Schema (ECIES-aehnlich, wie beim Key-Wrapping):
//! 1. Ephemeres X25519-Schluessel-Paar generieren
//! 2. DH mit dem oeffentlichen Schluessel des Empfaengers
//! 3. HKDF-SHA256 -> Nachrichten-Schluessel
//! 4. AEAD verschluesseln (AES-256-GCM oder ChaCha20-Poly1305)
//!
//! ## Format
//! ```text
//! [algorithmus(1)] [ephemeral_public(32)] [nonce(12)] [ciphertext + auth_tag(16)]
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce as AesNonce,
};
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce as ChaChaNonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};

use crate::error::{CryptoError, CryptoResult};
use crate::types::{CipherAlgorithm, KeyPair, PublicKey, SecretBytes, X25519_SCHLUESSEL_LAENGE};

const HKDF_INFO: &[u8] = b"kryptochat-message-v1";
const NONCE_LAENGE: usize = 12;
const TAG_LAENGE: usize = 16;
const HEADER_LAENGE: usize = 1 + X25519_SCHLUESSEL_LAENGE + NONCE_LAENGE;

/// Asymmetrische Ver- und Entschluesselung einzelner Nachrichten
pub trait CipherEngine: Send + Sync {
    /// Verschluesselt einen Klartext mit einem oeffentlichen Schluessel
    fn encrypt(&self, plaintext: &str, public_key: &PublicKey) -> CryptoResult<Vec<u8>>;

    /// Entschluesselt einen Ciphertext mit dem passenden privaten Schluessel
    ///
    /// Liefert `Entschluesselung` bei beschaedigten Daten oder falschem Schluessel.
    fn decrypt(&self, ciphertext: &[u8], private_key: &SecretBytes) -> CryptoResult<String>;
}

/// Erzeugt ein neues X25519-Schluesselpaar
pub fn generate_key_pair() -> KeyPair {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = X25519PublicKey::from(&secret);
    KeyPair {
        public_key: PublicKey::new(public.as_bytes().to_vec()),
        private_key: SecretBytes::new(secret.to_bytes().to_vec()),
    }
}

/// X25519 + HKDF + AEAD ("sealed box")
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedBoxCipher {
    algorithm: CipherAlgorithm,
}

impl SealedBoxCipher {
    pub fn new(algorithm: CipherAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }
}

impl CipherEngine for SealedBoxCipher {
    fn encrypt(&self, plaintext: &str, public_key: &PublicKey) -> CryptoResult<Vec<u8>> {
        let recipient_bytes =
            public_key
                .als_x25519()
                .ok_or(CryptoError::UngueltigeSchluesselLaenge {
                    erwartet: X25519_SCHLUESSEL_LAENGE,
                    erhalten: public_key.as_bytes().len(),
                })?;

        let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = X25519PublicKey::from(&ephemeral_secret);
        let dh_output = ephemeral_secret.diffie_hellman(&X25519PublicKey::from(recipient_bytes));

        let message_key = derive_message_key(dh_output.as_bytes(), &recipient_bytes)?;

        let mut nonce_bytes = [0u8; NONCE_LAENGE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = match self.algorithm {
            CipherAlgorithm::Aes256Gcm => {
                let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&message_key));
                cipher.encrypt(AesNonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            }
            CipherAlgorithm::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(&message_key));
                cipher.encrypt(ChaChaNonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            }
        }
        .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

        let mut out = Vec::with_capacity(HEADER_LAENGE + ciphertext.len());
        out.push(self.algorithm.kennung());
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], private_key: &SecretBytes) -> CryptoResult<String> {
        if ciphertext.len() < HEADER_LAENGE + TAG_LAENGE {
            return Err(CryptoError::Entschluesselung(format!(
                "Ciphertext zu kurz: {} Bytes",
                ciphertext.len()
            )));
        }

        let private_bytes: [u8; X25519_SCHLUESSEL_LAENGE] = private_key
            .as_bytes()
            .try_into()
            .map_err(|_| CryptoError::UngueltigeSchluesselLaenge {
                erwartet: X25519_SCHLUESSEL_LAENGE,
                erhalten: private_key.len(),
            })?;

        let algorithm = CipherAlgorithm::aus_kennung(ciphertext[0]).ok_or_else(|| {
            CryptoError::Entschluesselung(format!("Unbekannter Algorithmus {}", ciphertext[0]))
        })?;

        let (ephemeral_part, rest) = ciphertext[1..].split_at(X25519_SCHLUESSEL_LAENGE);
        let (nonce_bytes, body) = rest.split_at(NONCE_LAENGE);

        let mut ephemeral_bytes = [0u8; X25519_SCHLUESSEL_LAENGE];
        ephemeral_bytes.copy_from_slice(ephemeral_part);

        // DH mit dem eigenen privaten Schluessel
        let secret = StaticSecret::from(private_bytes);
        let own_public = X25519PublicKey::from(&secret);
        let dh_output = secret.diffie_hellman(&X25519PublicKey::from(ephemeral_bytes));

        let message_key = derive_message_key(dh_output.as_bytes(), own_public.as_bytes())?;

        let plaintext = match algorithm {
            CipherAlgorithm::Aes256Gcm => {
                let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&message_key));
                cipher.decrypt(AesNonce::from_slice(nonce_bytes), body)
            }
            CipherAlgorithm::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(&message_key));
                cipher.decrypt(ChaChaNonce::from_slice(nonce_bytes), body)
            }
        }
        .map_err(|e| CryptoError::Entschluesselung(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::Entschluesselung(format!("Klartext ist kein UTF-8: {e}")))
    }
}

/// Leitet den Nachrichten-Schluessel via HKDF-SHA256 ab
///
/// Salt ist der oeffentliche Schluessel des Empfaengers.
fn derive_message_key(dh_secret: &[u8], recipient_public: &[u8]) -> CryptoResult<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(recipient_public), dh_secret);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
