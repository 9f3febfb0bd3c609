//! Verzeichnis-basierte Schluesselablage
//!
//! Legt Schluessel unter `base_dir/public/<name>.pem` und
//! `base_dir/private/<name>.pem` ab. Beide Dateien enthalten einen
//! PEM-artigen Base64-Block. Die Verzeichnisse werden beim ersten Schreiben
//! angelegt.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use kryptochat_core::Username;

use crate::error::{CryptoError, CryptoResult};
use crate::keystore::KeyStore;
use crate::types::{KeyPair, PublicKey, SecretBytes, X25519_SCHLUESSEL_LAENGE};

const PUBLIC_LABEL: &str = "KRYPTOCHAT X25519 PUBLIC KEY";
const PRIVATE_LABEL: &str = "KRYPTOCHAT X25519 PRIVATE KEY";

/// Schluesselpaare als Dateien in einem Verzeichnis
#[derive(Debug, Clone)]
pub struct DirectoryKeyStore {
    base_dir: PathBuf,
}

impl DirectoryKeyStore {
    /// Neue Ablage mit dem angegebenen Basisverzeichnis erstellen
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn public_path(&self, identitaet: &Username) -> PathBuf {
        self.base_dir
            .join("public")
            .join(format!("{}.pem", identitaet.as_str()))
    }

    fn private_path(&self, identitaet: &Username) -> PathBuf {
        self.base_dir
            .join("private")
            .join(format!("{}.pem", identitaet.as_str()))
    }

    async fn lesen(&self, pfad: &Path, label: &str, identitaet: &Username) -> CryptoResult<Vec<u8>> {
        let inhalt = match tokio::fs::read_to_string(pfad).await {
            Ok(inhalt) => inhalt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CryptoError::kein_schluessel(identitaet));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = pem_dekodieren(&inhalt, label)?;
        if bytes.len() != X25519_SCHLUESSEL_LAENGE {
            return Err(CryptoError::UngueltigeDaten(format!(
                "{}: erwartet {} Bytes, erhalten {}",
                pfad.display(),
                X25519_SCHLUESSEL_LAENGE,
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl KeyStore for DirectoryKeyStore {
    async fn public_key_of(&self, identitaet: &Username) -> CryptoResult<PublicKey> {
        let pfad = self.public_path(identitaet);
        let bytes = self.lesen(&pfad, PUBLIC_LABEL, identitaet).await?;
        Ok(PublicKey::new(bytes))
    }

    async fn private_key_of(&self, identitaet: &Username) -> CryptoResult<SecretBytes> {
        let pfad = self.private_path(identitaet);
        let bytes = self.lesen(&pfad, PRIVATE_LABEL, identitaet).await?;
        Ok(SecretBytes::new(bytes))
    }

    async fn put(&self, identitaet: &Username, paar: KeyPair) -> CryptoResult<()> {
        let public_path = self.public_path(identitaet);
        let private_path = self.private_path(identitaet);

        for pfad in [&public_path, &private_path] {
            if let Some(parent) = pfad.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Privater Schluessel zuerst: ein oeffentlicher Schluessel ohne
        // privaten wuerde `contains` faelschlich true liefern
        tokio::fs::write(
            &private_path,
            pem_kodieren(paar.private_key.as_bytes(), PRIVATE_LABEL),
        )
        .await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&private_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        tokio::fs::write(
            &public_path,
            pem_kodieren(paar.public_key.as_bytes(), PUBLIC_LABEL),
        )
        .await?;

        tracing::debug!(
            identitaet = %identitaet,
            pfad = %public_path.display(),
            "Schluesselpaar gespeichert"
        );
        Ok(())
    }

    async fn contains(&self, identitaet: &Username) -> CryptoResult<bool> {
        Ok(tokio::fs::try_exists(self.public_path(identitaet)).await?
            && tokio::fs::try_exists(self.private_path(identitaet)).await?)
    }
}

fn pem_kodieren(bytes: &[u8], label: &str) -> String {
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        STANDARD.encode(bytes)
    )
}

fn pem_dekodieren(inhalt: &str, label: &str) -> CryptoResult<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let mut zeilen = inhalt.lines().map(str::trim).skip_while(|z| *z != begin);
    if zeilen.next().is_none() {
        return Err(CryptoError::UngueltigeDaten(format!("Kein '{begin}' Block")));
    }

    let mut body = String::new();
    let mut beendet = false;
    for zeile in zeilen {
        if zeile == end {
            beendet = true;
            break;
        }
        body.push_str(zeile);
    }
    if !beendet {
        return Err(CryptoError::UngueltigeDaten(format!("Kein '{end}' gefunden")));
    }

    Ok(STANDARD.decode(body)?)
}
