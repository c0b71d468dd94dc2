use std::{
    future::Future,
    path::{Path, PathBuf},
};

use log::warn;

use crate::{
    config::PersistenceSettings,
    db::models::StoredAccount,
    error::PersistenceError,
    utils::{same_address, short_id},
};

/// Persistence boundary for account snapshots.
///
/// Implementations must be idempotent; saving the same snapshot twice is harmless.
pub trait SnapshotStore: Send + Sync + 'static {
    fn save(
        &self,
        account: &StoredAccount,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn load(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<StoredAccount>, PersistenceError>> + Send;
}

/// Inert store: nothing is written and nothing is ever found.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

impl SnapshotStore for NoopStore {
    async fn save(&self, _account: &StoredAccount) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn load(&self, _address: &str) -> Result<Option<StoredAccount>, PersistenceError> {
        Ok(None)
    }
}

/// One JSON file per address, named after the address's short identifier.
///
/// Writes go to a temp file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    directory: PathBuf,
}

impl JsonFileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, address: &str) -> PathBuf {
        self.directory
            .join(format!("store_{}.json", short_id(address)))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl SnapshotStore for JsonFileStore {
    async fn save(&self, account: &StoredAccount) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| io_error(&self.directory, e))?;

        let path = self.path_for(&account.address);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(account)?;

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        Ok(())
    }

    async fn load(&self, address: &str) -> Result<Option<StoredAccount>, PersistenceError> {
        let path = self.path_for(address);

        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let stored: StoredAccount = serde_json::from_slice(&body)?;

        // Short identifiers can collide; never hand one address another's history
        if !same_address(&stored.address, address) {
            warn!(
                "Snapshot {} belongs to {}, not {}; ignoring it",
                path.display(),
                stored.address,
                address
            );
            return Ok(None);
        }

        Ok(Some(stored))
    }
}

/// Store selected from configuration at runtime.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Noop(NoopStore),
    Json(JsonFileStore),
}

impl AnyStore {
    pub fn from_settings(settings: Option<&PersistenceSettings>) -> Self {
        match settings {
            Some(s) => Self::Json(JsonFileStore::new(&s.directory)),
            None => Self::Noop(NoopStore),
        }
    }
}

impl SnapshotStore for AnyStore {
    async fn save(&self, account: &StoredAccount) -> Result<(), PersistenceError> {
        match self {
            Self::Noop(store) => store.save(account).await,
            Self::Json(store) => store.save(account).await,
        }
    }

    async fn load(&self, address: &str) -> Result<Option<StoredAccount>, PersistenceError> {
        match self {
            Self::Noop(store) => store.load(address).await,
            Self::Json(store) => store.load(address).await,
        }
    }
}
