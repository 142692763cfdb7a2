//! Session credential handling and access control.
//!
//! This module provides:
//! - `CredentialStorage` backends: plain file, OS keychain, encrypted file, memory
//! - `TokenStore`: the single shared session credential, restored once at startup
//! - `SessionGuard`: decides whether protected views may render
//! - `LoginFlow`: validates and submits coach or player credentials
//!
//! Only the token store mutates the credential. Everything else reads it or
//! asks the store to `set`/`clear` it.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Config, StorageKind, ENV_STORE_PASSPHRASE};

pub mod credentials;
pub mod encrypted;
pub mod guard;
pub mod login;
pub mod session;
pub mod storage;

pub use credentials::KeyringStorage;
pub use encrypted::EncryptedFileStorage;
pub use guard::{decide, AuthPhase, GuardDecision, SessionGuard};
pub use login::{Field, LoginError, LoginFlow, LoginForm, OtpForm, ValidationErrors};
pub use session::{Credential, SessionState, TokenStore};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage, StorageError};

/// Build the durable medium selected by `config`.
///
/// `passphrase` is required for [`StorageKind::Encrypted`] and ignored otherwise.
pub fn open_storage(
    config: &Config,
    passphrase: Option<&str>,
) -> Result<Arc<dyn CredentialStorage>> {
    let storage: Arc<dyn CredentialStorage> = match config.storage {
        StorageKind::File => Arc::new(FileStorage::in_dir(&config.data_dir()?)),
        StorageKind::Keyring => {
            Arc::new(KeyringStorage::new().context("Failed to open OS keychain entry")?)
        }
        StorageKind::Encrypted => {
            let passphrase = passphrase
                .filter(|p| !p.is_empty())
                .with_context(|| format!("{} must be set for encrypted storage", ENV_STORE_PASSPHRASE))?;
            Arc::new(
                EncryptedFileStorage::in_dir(&config.data_dir()?, passphrase)
                    .context("Failed to set up encrypted token file")?,
            )
        }
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
    };
    tracing::debug!(storage = %storage.describe(), "Credential storage ready");
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_storage() {
        let config = Config {
            storage: StorageKind::Memory,
            ..Config::default()
        };
        let storage = open_storage(&config, None).unwrap();
        assert_eq!(storage.read().unwrap(), None);
    }

    #[test]
    fn test_encrypted_requires_passphrase() {
        let config = Config {
            storage: StorageKind::Encrypted,
            ..Config::default()
        };
        assert!(open_storage(&config, None).is_err());
        assert!(open_storage(&config, Some("")).is_err());
    }
}
