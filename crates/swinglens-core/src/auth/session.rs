use std::fmt;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::storage::{CredentialStorage, StorageError};

/// Opaque bearer token identifying an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token. Empty or whitespace-only tokens are not credentials.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<{} bytes>)", self.0.len())
    }
}

/// In-memory projection of the persisted credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub credential: Option<Credential>,
    /// True only until the initial restore from storage completes.
    pub is_loading: bool,
}

impl SessionState {
    fn initial() -> Self {
        Self {
            credential: None,
            is_loading: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.is_loading && self.credential.is_some()
    }
}

struct Inner {
    storage: Arc<dyn CredentialStorage>,
    state: watch::Sender<SessionState>,
    restored: OnceCell<()>,
    // Serializes durable writes with their in-memory update
    write_lock: Mutex<()>,
}

/// Single source of truth for the session credential.
///
/// Clones share the same state; every holder observes `set`/`clear` made
/// through any other clone. Only `load`, `set` and `clear` mutate it.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        let (state, _) = watch::channel(SessionState::initial());
        Self {
            inner: Arc::new(Inner {
                storage,
                state,
                restored: OnceCell::new(),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Restore the persisted credential into memory.
    ///
    /// Runs the storage read at most once per store; concurrent callers wait
    /// for the first call and later calls return immediately. Storage errors
    /// are logged and treated as "no credential".
    pub async fn load(&self) {
        self.inner
            .restored
            .get_or_init(|| async {
                let _guard = self.inner.write_lock.lock().await;

                let credential = match self.run_blocking(|s| s.read()).await {
                    Ok(Some(token)) => Credential::new(token),
                    Ok(None) => None,
                    Err(e) => {
                        warn!(error = %e, storage = %self.inner.storage.describe(), "Failed to restore session, starting logged out");
                        None
                    }
                };

                debug!(restored = credential.is_some(), "Session restore complete");
                self.inner.state.send_modify(|state| {
                    state.credential = credential;
                    state.is_loading = false;
                });
            })
            .await;
    }

    /// Persist `token` and then publish it to every observer.
    pub async fn set(&self, token: impl Into<String>) -> Result<(), StorageError> {
        let credential = Credential::new(token).ok_or(StorageError::EmptyCredential)?;
        let _guard = self.inner.write_lock.lock().await;

        let raw = credential.as_str().to_string();
        self.run_blocking(move |s| s.write(&raw)).await?;

        self.inner
            .state
            .send_modify(|state| state.credential = Some(credential));
        info!("Session credential stored");
        Ok(())
    }

    /// Remove the credential from storage and memory. Clearing an empty store
    /// succeeds and notifies nobody.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.inner.write_lock.lock().await;

        self.run_blocking(|s| s.remove()).await?;

        let changed = self.inner.state.send_if_modified(|state| {
            if state.credential.is_some() {
                state.credential = None;
                true
            } else {
                false
            }
        });
        if changed {
            info!("Session credential cleared");
        }
        Ok(())
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Current credential, if any.
    pub fn credential(&self) -> Option<Credential> {
        self.inner.state.borrow().credential.clone()
    }

    /// Observe state changes. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn storage_description(&self) -> String {
        self.inner.storage.describe()
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&dyn CredentialStorage) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.inner.storage);
        tokio::task::spawn_blocking(move || op(storage.as_ref()))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::storage::MemoryStorage;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Storage wrapper that counts reads and can be told to fail.
    #[derive(Default)]
    pub(crate) struct FlakyStorage {
        pub inner: MemoryStorage,
        pub reads: AtomicUsize,
        pub fail_reads: AtomicBool,
        pub fail_writes: AtomicBool,
    }

    impl FlakyStorage {
        fn io_error() -> StorageError {
            StorageError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    impl CredentialStorage for FlakyStorage {
        fn read(&self) -> Result<Option<String>, StorageError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            // Give concurrent loaders a chance to pile up
            std::thread::sleep(std::time::Duration::from_millis(20));
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Self::io_error());
            }
            self.inner.read()
        }

        fn write(&self, credential: &str) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Self::io_error());
            }
            self.inner.write(credential)
        }

        fn remove(&self) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Self::io_error());
            }
            self.inner.remove()
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    #[test]
    fn test_credential_rejects_blank() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
        assert_eq!(Credential::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("super-secret").unwrap();
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("super-secret"));
    }

    #[tokio::test]
    async fn test_initial_state_is_loading() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        let state = store.state();
        assert!(state.is_loading);
        assert!(state.credential.is_none());
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn test_load_empty_storage() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        store.load().await;
        let state = store.state();
        assert!(!state.is_loading);
        assert!(state.credential.is_none());
    }

    #[tokio::test]
    async fn test_load_restores_credential() {
        let store = TokenStore::new(Arc::new(MemoryStorage::with_credential("persisted")));
        store.load().await;
        assert!(store.state().is_authenticated());
        assert_eq!(store.credential().unwrap().as_str(), "persisted");
    }

    #[tokio::test]
    async fn test_load_failure_fails_open_to_logged_out() {
        let storage = FlakyStorage::default();
        storage.inner.write("persisted").unwrap();
        storage.fail_reads.store(true, Ordering::SeqCst);

        let store = TokenStore::new(Arc::new(storage));
        store.load().await;

        let state = store.state();
        assert!(!state.is_loading);
        assert!(state.credential.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_loads_read_storage_once() {
        let storage = Arc::new(FlakyStorage::default());
        storage.inner.write("persisted").unwrap();
        let store = TokenStore::new(storage.clone());

        let (a, b) = (store.clone(), store.clone());
        let first = tokio::spawn(async move { a.load().await });
        let second = tokio::spawn(async move { b.load().await });
        first.await.unwrap();
        second.await.unwrap();
        store.load().await;

        assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
        assert_eq!(store.credential().unwrap().as_str(), "persisted");
    }

    #[tokio::test]
    async fn test_set_persists_and_is_shared() {
        let storage = Arc::new(MemoryStorage::new());
        let store = TokenStore::new(storage.clone());
        store.load().await;

        let other_holder = store.clone();
        store.set("fresh-token").await.unwrap();

        assert_eq!(other_holder.credential().unwrap().as_str(), "fresh-token");
        assert_eq!(storage.read().unwrap().as_deref(), Some("fresh-token"));
    }

    #[tokio::test]
    async fn test_set_notifies_subscribers() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        store.load().await;
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.set("fresh-token").await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().credential.as_ref().map(Credential::as_str),
            Some("fresh-token")
        );
    }

    #[tokio::test]
    async fn test_set_rejects_empty_token() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        store.load().await;
        assert!(matches!(store.set("").await, Err(StorageError::EmptyCredential)));
        assert!(store.credential().is_none());
    }

    #[tokio::test]
    async fn test_set_failure_propagates_and_leaves_state_unchanged() {
        let storage = Arc::new(FlakyStorage::default());
        storage.fail_writes.store(true, Ordering::SeqCst);
        let store = TokenStore::new(storage.clone());
        store.load().await;

        let result = store.set("never-stored").await;
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(store.credential().is_none());
        assert_eq!(storage.inner.read().unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_removes_credential() {
        let storage = Arc::new(MemoryStorage::with_credential("persisted"));
        let store = TokenStore::new(storage.clone());
        store.load().await;

        store.clear().await.unwrap();

        assert!(store.credential().is_none());
        assert_eq!(storage.read().unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = TokenStore::new(Arc::new(MemoryStorage::new()));
        store.load().await;
        let mut rx = store.subscribe();
        rx.borrow_and_update();
        let before = store.state();

        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.state(), before);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_clear_failure_keeps_credential() {
        let storage = Arc::new(FlakyStorage::default());
        storage.inner.write("persisted").unwrap();
        let store = TokenStore::new(storage.clone());
        store.load().await;

        storage.fail_writes.store(true, Ordering::SeqCst);
        assert!(store.clear().await.is_err());
        assert_eq!(store.credential().unwrap().as_str(), "persisted");
    }

    #[tokio::test]
    async fn test_restart_restores_previous_set() {
        let dir = tempfile::tempdir().unwrap();
        let first_run = TokenStore::new(Arc::new(crate::auth::FileStorage::in_dir(dir.path())));
        first_run.load().await;
        first_run.set("survives-restart").await.unwrap();
        drop(first_run);

        let second_run = TokenStore::new(Arc::new(crate::auth::FileStorage::in_dir(dir.path())));
        assert!(second_run.state().is_loading);
        second_run.load().await;
        assert_eq!(second_run.credential().unwrap().as_str(), "survives-restart");
    }
}
