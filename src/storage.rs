use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bincode::{Decode, Encode};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::types::NodeId;

/// The part of the election state that must survive restarts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct HardState {
    pub current_term: u64,
    /// only meaningful for `current_term`
    pub voted_for: Option<NodeId>,
}

/// Durable storage of the current term and vote.
///
/// `save` must not return before the state is durable: a node that answers a vote
/// and then crashes must find that vote again when it restarts.
#[async_trait]
pub trait StateStore: Send + 'static {
    /// Returns the last saved state, or the default state on first boot
    async fn load(&self) -> Result<HardState, StorageError>;

    async fn save(&mut self, state: &HardState) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct MemStoreInner {
    state: HardState,
    saves: usize,
    fail_saves: bool,
}

/// In-memory store, clones share the same state so a test can inspect what a node persisted
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    inner: Arc<Mutex<MemStoreInner>>,
}

impl MemStore {
    pub fn new(state: HardState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemStoreInner {
                state,
                ..Default::default()
            })),
        }
    }

    pub fn state(&self) -> HardState {
        self.inner.lock().state
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }

    /// Makes every following save fail until called again with `false`
    pub fn fail_saves(&self, fail: bool) {
        self.inner.lock().fail_saves = fail;
    }
}

#[async_trait]
impl StateStore for MemStore {
    async fn load(&self) -> Result<HardState, StorageError> {
        Ok(self.inner.lock().state)
    }

    async fn save(&mut self, state: &HardState) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.fail_saves {
            return Err(StorageError::Unavailable("save failure injected".to_string()));
        }
        inner.state = *state;
        inner.saves += 1;
        Ok(())
    }
}

/// Keeps the state in a single file, replaced atomically on every save
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }

    /// Directory holding the state file, the current one for a bare file name
    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Makes the rename itself durable, otherwise a crash can bring back the previous file
    #[cfg(unix)]
    async fn sync_parent_dir(&self) -> Result<(), StorageError> {
        let dir = tokio::fs::File::open(self.parent_dir()).await?;
        dir.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_parent_dir(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn load(&self) -> Result<HardState, StorageError> {
        let buffer = match tokio::fs::read(&self.path).await {
            Ok(buffer) => buffer,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no state file at {}, starting from scratch", self.path.display());
                return Ok(HardState::default());
            }
            Err(e) => return Err(e.into()),
        };

        let (state, _): (HardState, usize) = bincode::decode_from_slice(&buffer, bincode::config::standard())?;
        Ok(state)
    }

    async fn save(&mut self, state: &HardState) -> Result<(), StorageError> {
        let encoded = bincode::encode_to_vec(state, bincode::config::standard())?;

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&encoded).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;
        self.sync_parent_dir().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[tokio::test]
    async fn mem_store_shares_state_between_clones() {
        let handle = MemStore::default();
        let mut store = handle.clone();

        let state = HardState {
            current_term: 3,
            voted_for: Some(2),
        };
        store.save(&state).await.unwrap();

        assert_eq!(handle.state(), state);
        assert_eq!(handle.save_count(), 1);
        assert_eq!(handle.load().await.unwrap(), state);
    }

    #[tokio::test]
    async fn mem_store_failure_keeps_previous_state() {
        let mut store = MemStore::new(HardState {
            current_term: 1,
            voted_for: None,
        });
        store.fail_saves(true);

        let result = store
            .save(&HardState {
                current_term: 2,
                voted_for: Some(1),
            })
            .await;
        assert_matches!(result, Err(StorageError::Unavailable(_)));
        assert_eq!(store.state().current_term, 1);
        assert_eq!(store.save_count(), 0);

        store.fail_saves(false);
        store.save(&HardState::default()).await.unwrap();
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn file_store_first_boot_is_empty() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("hard_state"));

        assert_eq!(store.load().await.unwrap(), HardState::default());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("hard_state");

        let mut store = FileStore::new(&path);
        store
            .save(&HardState {
                current_term: 4,
                voted_for: Some(3),
            })
            .await
            .unwrap();
        store
            .save(&HardState {
                current_term: 5,
                voted_for: None,
            })
            .await
            .unwrap();

        let reopened = FileStore::new(&path);
        let state = reopened.load().await.unwrap();
        assert_eq!(state.current_term, 5);
        assert_eq!(state.voted_for, None);
        assert!(!store.temp_path().exists(), "temporary file must be renamed away");
    }

    #[test]
    fn parent_dir_of_bare_file_name_is_current_dir() {
        assert_eq!(FileStore::new("hard_state").parent_dir(), Path::new("."));
        assert_eq!(
            FileStore::new("/var/lib/node/hard_state").parent_dir(),
            Path::new("/var/lib/node")
        );
    }

    #[tokio::test]
    async fn file_store_syncs_its_directory() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileStore::new(dir.path().join("nested").join("hard_state"));
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        store
            .save(&HardState {
                current_term: 2,
                voted_for: Some(1),
            })
            .await
            .unwrap();
        store.sync_parent_dir().await.unwrap();

        assert!(!store.temp_path().exists());
        assert_eq!(store.parent_dir(), dir.path().join("nested"));
        assert_eq!(store.load().await.unwrap().voted_for, Some(1));
    }

    #[tokio::test]
    async fn file_store_save_fails_without_directory() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileStore::new(dir.path().join("missing").join("hard_state"));

        let result = store.save(&HardState::default()).await;
        assert_matches!(result, Err(StorageError::Io(_)));
    }

    #[tokio::test]
    async fn file_store_rejects_garbage() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("hard_state");
        std::fs::write(&path, [0xff]).unwrap();

        let result = FileStore::new(&path).load().await;
        assert_matches!(result, Err(StorageError::Decode(_)));
    }
}
