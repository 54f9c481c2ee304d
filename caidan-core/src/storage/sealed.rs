use crate::error::{CaidanError, Result};
use crate::storage::ArtifactStore;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};

// ChaCha20Poly1305 for authenticated encryption
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

const SALT_KEY: &str = "__sealed_salt";
const SALT_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const PBKDF2_ROUNDS: u32 = 100_000;

/// Wraps another store and encrypts every value at rest.
///
/// The key is derived once from a passphrase and a random salt kept in the
/// inner store; each value gets its own nonce. Values that fail to decrypt
/// (tampered, or written under another passphrase) read as absent.
pub struct SealedArtifactStore<S> {
    inner: S,
    cipher: ChaCha20Poly1305,
}

impl<S: ArtifactStore> SealedArtifactStore<S> {
    pub async fn open(inner: S, passphrase: &str) -> Result<Self> {
        Self::open_with_rounds(inner, passphrase, PBKDF2_ROUNDS).await
    }

    pub async fn open_with_rounds(inner: S, passphrase: &str, rounds: u32) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(CaidanError::config("Passphrase cannot be empty"));
        }

        let salt = match inner.get(SALT_KEY).await? {
            Some(encoded) => STANDARD
                .decode(encoded)
                .map_err(|e| CaidanError::crypto(format!("Corrupt salt: {}", e)))?,
            None => {
                let mut salt = vec![0u8; SALT_SIZE];
                OsRng.fill_bytes(&mut salt);
                inner.set(SALT_KEY, &STANDARD.encode(&salt)).await?;
                salt
            }
        };

        let key = derive_key(passphrase, &salt, rounds);
        Ok(Self {
            inner,
            cipher: ChaCha20Poly1305::new(&key),
        })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn seal(&self, value: &str) -> Result<String> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, value.as_bytes())
            .map_err(|e| CaidanError::crypto(format!("Encryption failed: {}", e)))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn unseal(&self, encoded: &str) -> Result<String> {
        let sealed = STANDARD
            .decode(encoded)
            .map_err(|e| CaidanError::crypto(format!("Invalid encoding: {}", e)))?;
        if sealed.len() < NONCE_SIZE {
            return Err(CaidanError::crypto("Sealed value too short"));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CaidanError::crypto(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| CaidanError::crypto(format!("Invalid UTF-8: {}", e)))
    }
}

#[async_trait]
impl<S: ArtifactStore> ArtifactStore for SealedArtifactStore<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(encoded) = self.inner.get(key).await? else {
            return Ok(None);
        };

        match self.unseal(&encoded) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Discarding unreadable artifact '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let sealed = self.seal(value)?;
        self.inner.set(key, &sealed).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}

/// Derive encryption key from passphrase using PBKDF2
fn derive_key(passphrase: &str, salt: &[u8], rounds: u32) -> Key {
    use pbkdf2::pbkdf2_hmac;
    use sha2::Sha256;

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, rounds, &mut key);
    *Key::from_slice(&key)
}
