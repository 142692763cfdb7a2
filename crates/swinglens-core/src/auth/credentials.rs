use keyring::Entry;
use tracing::debug;

use super::storage::{CredentialStorage, StorageError, TOKEN_KEY};

const SERVICE_NAME: &str = "swinglens";

/// Session credential kept in the OS keychain.
pub struct KeyringStorage {
    entry: Entry,
}

impl KeyringStorage {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_service(SERVICE_NAME)
    }

    /// Keychain entry under a custom service name (one per profile/environment).
    pub fn with_service(service: &str) -> Result<Self, StorageError> {
        let entry = Entry::new(service, TOKEN_KEY)?;
        Ok(Self { entry })
    }
}

impl CredentialStorage for KeyringStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, credential: &str) -> Result<(), StorageError> {
        self.entry.set_password(credential)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        match self.entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => {
                debug!("No keychain entry to delete");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        "keyring".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyring_storage_with_mock_backend() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());

        let storage = KeyringStorage::with_service("swinglens-test").unwrap();
        assert_eq!(storage.read().unwrap(), None);

        storage.write("keychain-jwt").unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some("keychain-jwt"));

        storage.remove().unwrap();
        assert_eq!(storage.read().unwrap(), None);

        // Deleting a missing entry is not an error
        storage.remove().unwrap();
    }
}
