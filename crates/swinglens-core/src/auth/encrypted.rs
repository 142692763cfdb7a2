//! Passphrase-encrypted credential file.
//!
//! Used where no OS keychain is available but the token should still not sit
//! on disk in clear text. Layout of `token.enc`:
//!
//! ```text
//! magic "SLT1" | m_cost u32 | t_cost u32 | p_cost u32 | salt[16] | nonce[12] | ciphertext
//! ```
//!
//! The key is derived with Argon2id from the passphrase and a fresh random salt
//! on every write; the Argon2 parameters travel in the header so a file stays
//! readable if the defaults change.

use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use super::storage::{CredentialStorage, StorageError};

pub const ENCRYPTED_FILE: &str = "token.enc";

const MAGIC: &[u8; 4] = b"SLT1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 12 + SALT_LEN + NONCE_LEN;

pub struct EncryptedFileStorage {
    path: PathBuf,
    passphrase: String,
    params: Params,
}

impl EncryptedFileStorage {
    pub fn new(path: PathBuf, passphrase: impl Into<String>) -> Result<Self, StorageError> {
        Self::with_params(path, passphrase, Params::default())
    }

    pub fn in_dir(data_dir: &Path, passphrase: impl Into<String>) -> Result<Self, StorageError> {
        Self::new(data_dir.join(ENCRYPTED_FILE), passphrase)
    }

    /// Custom Argon2 cost parameters for newly written files.
    pub fn with_params(
        path: PathBuf,
        passphrase: impl Into<String>,
        params: Params,
    ) -> Result<Self, StorageError> {
        let passphrase = passphrase.into();
        if passphrase.is_empty() {
            return Err(StorageError::Crypto("passphrase must not be empty".to_string()));
        }
        Ok(Self {
            path,
            passphrase,
            params,
        })
    }

    fn derive_key(&self, salt: &[u8], params: Params) -> Result<[u8; KEY_LEN], StorageError> {
        let mut key = [0u8; KEY_LEN];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(self.passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| StorageError::Crypto(e.to_string()))?;
        Ok(key)
    }

    fn seal(&self, plaintext: &str) -> Result<Vec<u8>, StorageError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt, self.params.clone())?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| StorageError::Crypto(e.to_string()))?;

        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.params.m_cost().to_le_bytes());
        out.extend_from_slice(&self.params.t_cost().to_le_bytes());
        out.extend_from_slice(&self.params.p_cost().to_le_bytes());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(&self, bytes: &[u8]) -> Result<String, StorageError> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(StorageError::Corrupt("unrecognized token file header".to_string()));
        }

        let mut offset = MAGIC.len();
        let mut next_u32 = || {
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[offset..offset + 4]);
            offset += 4;
            u32::from_le_bytes(word)
        };
        let (m_cost, t_cost, p_cost) = (next_u32(), next_u32(), next_u32());
        let params = Params::new(m_cost, t_cost, p_cost, Some(KEY_LEN))
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        let salt_start = MAGIC.len() + 12;
        let salt = &bytes[salt_start..salt_start + SALT_LEN];
        let nonce = &bytes[salt_start + SALT_LEN..HEADER_LEN];
        let ciphertext = &bytes[HEADER_LEN..];

        let key = self.derive_key(salt, params)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StorageError::Crypto("wrong passphrase or tampered file".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| StorageError::Corrupt(e.to_string()))
    }
}

impl CredentialStorage for EncryptedFileStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)?;
        self.open(&bytes).map(Some)
    }

    fn write(&self, credential: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let sealed = self.seal(credential)?;
        let tmp = self.path.with_extension("enc.tmp");
        std::fs::write(&tmp, sealed)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("encrypted:{}", self.path.display())
    }
}
