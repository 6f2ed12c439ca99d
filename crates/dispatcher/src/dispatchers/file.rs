//! FileDispatcher - writes blobs to disk, one file per blob

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use contracts::{BlobDispatcher, BlobRecord, ContractError, DispatcherConfig};

/// Configuration for FileDispatcher
#[derive(Debug, Clone)]
pub struct FileDispatcherConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// Create `base_path` if it does not exist
    pub create_dirs: bool,
}

impl FileDispatcherConfig {
    /// Read `base_path` (required) and `create_dirs` (default true)
    pub fn from_config(config: &DispatcherConfig) -> Result<Self, ContractError> {
        Ok(Self {
            base_path: PathBuf::from(config.require_str("base_path")?),
            create_dirs: config.get_bool("create_dirs")?.unwrap_or(true),
        })
    }
}

/// Dispatcher that writes every blob to `<base_path>/<yyyy-mm-dd>/<sequence>-<hhmmss.mmm>.blob`
#[derive(Debug, Default)]
pub struct FileDispatcher {
    config: Option<FileDispatcherConfig>,
    open: AtomicBool,
    created_dirs: Mutex<HashSet<PathBuf>>,
    /// Read-held by every write task; `close` takes it exclusively
    writes: Arc<RwLock<()>>,
}

impl FileDispatcher {
    pub const NAME: &'static str = "file";

    pub fn new() -> Self {
        Self::default()
    }

    /// Base directory, once initialized
    pub fn base_path(&self) -> Option<&Path> {
        self.config.as_ref().map(|c| c.base_path.as_path())
    }

    /// Relative location of a blob under the base path
    pub fn blob_path(blob: &BlobRecord) -> PathBuf {
        let received_at = blob.received_at();
        PathBuf::from(received_at.format("%Y-%m-%d").to_string()).join(format!(
            "{:012}-{}.blob",
            blob.sequence(),
            received_at.format("%H%M%S%.3f")
        ))
    }

    fn config(&self) -> Result<&FileDispatcherConfig, ContractError> {
        match (&self.config, self.open.load(Ordering::Acquire)) {
            (Some(config), true) => Ok(config),
            _ => Err(ContractError::not_open(Self::NAME)),
        }
    }

    async fn ensure_dir(&self, dir: &Path) -> std::io::Result<()> {
        let known = self
            .created_dirs
            .lock()
            .map(|dirs| dirs.contains(dir))
            .unwrap_or(false);
        if known {
            return Ok(());
        }
        fs::create_dir_all(dir).await?;
        if let Ok(mut dirs) = self.created_dirs.lock() {
            dirs.insert(dir.to_path_buf());
        }
        Ok(())
    }

    async fn write_blob_to_disk(&self, base: &Path, blob: &BlobRecord) -> std::io::Result<PathBuf> {
        let path = base.join(Self::blob_path(blob));
        if let Some(dir) = path.parent() {
            self.ensure_dir(dir).await?;
        }
        // The write runs in its own task so it is still tracked by `writes`
        // when the caller stops waiting on `accept`.
        let in_flight = Arc::clone(&self.writes).read_owned().await;
        let payload = blob.payload().clone();
        let target = path.clone();
        tokio::spawn(async move {
            let _in_flight = in_flight;
            fs::write(&target, payload).await
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(path)
    }
}

#[async_trait]
impl BlobDispatcher for FileDispatcher {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(name = "file_dispatcher_initialize", skip(self, config))]
    async fn initialize(&mut self, config: &DispatcherConfig) -> Result<(), ContractError> {
        let file_config = FileDispatcherConfig::from_config(config)?;

        if file_config.create_dirs {
            fs::create_dir_all(&file_config.base_path)
                .await
                .map_err(|e| {
                    ContractError::dispatcher_init(
                        Self::NAME,
                        format!("cannot create '{}': {e}", file_config.base_path.display()),
                    )
                })?;
        } else if !fs::metadata(&file_config.base_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(ContractError::dispatcher_init(
                Self::NAME,
                format!("'{}' is not a directory", file_config.base_path.display()),
            ));
        }

        info!(base_path = %file_config.base_path.display(), "FileDispatcher ready");
        self.config = Some(file_config);
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    #[instrument(
        name = "file_dispatcher_accept",
        skip(self, blob),
        fields(sequence = blob.sequence(), size = blob.size())
    )]
    async fn accept(&self, blob: &BlobRecord) -> Result<(), ContractError> {
        let base = self.config()?.base_path.clone();
        let path = self.write_blob_to_disk(&base, blob).await.map_err(|e| {
            error!(sequence = blob.sequence(), error = %e, "Write failed");
            ContractError::dispatch(Self::NAME, e.to_string())
        })?;
        debug!(path = %path.display(), "Blob written");
        Ok(())
    }

    #[instrument(name = "file_dispatcher_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        self.open.store(false, Ordering::Release);
        // Waits for writes left behind by accepts that timed out
        let _drained = self.writes.write().await;
        debug!("FileDispatcher closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DispatcherParams;
    use serde_json::json;
    use tempfile::tempdir;

    fn config(params: serde_json::Value) -> DispatcherConfig {
        let params: DispatcherParams = serde_json::from_value(params).unwrap();
        DispatcherConfig::new("file", params)
    }

    #[tokio::test]
    async fn test_file_dispatcher_writes_exact_payload() {
        let dir = tempdir().unwrap();
        let mut dispatcher = FileDispatcher::new();
        dispatcher
            .initialize(&config(json!({ "base_path": dir.path().to_str().unwrap() })))
            .await
            .unwrap();

        assert_eq!(dispatcher.base_path(), Some(dir.path()));

        let blob = BlobRecord::new(42, vec![7u8; 500]);
        dispatcher.accept(&blob).await.unwrap();

        let written = std::fs::read(dir.path().join(FileDispatcher::blob_path(&blob))).unwrap();
        assert_eq!(written, vec![7u8; 500]);
    }

    #[tokio::test]
    async fn test_file_dispatcher_requires_base_path() {
        let mut dispatcher = FileDispatcher::new();
        let result = dispatcher.initialize(&config(json!({}))).await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("base_path"), "got: {err}");
    }

    #[tokio::test]
    async fn test_file_dispatcher_missing_dir_without_create() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let mut dispatcher = FileDispatcher::new();
        let result = dispatcher
            .initialize(&config(json!({
                "base_path": missing.to_str().unwrap(),
                "create_dirs": false
            })))
            .await;
        assert!(matches!(result, Err(ContractError::DispatcherInit { .. })));
    }

    #[tokio::test]
    async fn test_file_dispatcher_rejects_after_close() {
        let dir = tempdir().unwrap();
        let mut dispatcher = FileDispatcher::new();
        dispatcher
            .initialize(&config(json!({ "base_path": dir.path().to_str().unwrap() })))
            .await
            .unwrap();
        dispatcher.close().await.unwrap();

        let result = dispatcher.accept(&BlobRecord::new(1, vec![1])).await;
        assert!(matches!(result, Err(ContractError::DispatcherNotOpen { .. })));
    }

    #[test]
    fn test_blob_path_layout() {
        let blob = BlobRecord::new(3, vec![1]);
        let path = FileDispatcher::blob_path(&blob);
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("000000000003-"), "got: {file_name}");
        assert!(file_name.ends_with(".blob"));
    }

    #[tokio::test]
    async fn test_close_waits_for_abandoned_write() {
        let dir = tempdir().unwrap();
        let mut dispatcher = FileDispatcher::new();
        dispatcher
            .initialize(&config(json!({ "base_path": dir.path().to_str().unwrap() })))
            .await
            .unwrap();

        let blob = BlobRecord::new(9, vec![3u8; 8 * 1024 * 1024]);
        // Give up on the accept right after the write task has started
        let _ = tokio::time::timeout(std::time::Duration::from_millis(1), dispatcher.accept(&blob)).await;
        dispatcher.close().await.unwrap();

        let target = dir.path().join(FileDispatcher::blob_path(&blob));
        if target.exists() {
            assert_eq!(std::fs::metadata(&target).unwrap().len(), 8 * 1024 * 1024);
        }
        let result = dispatcher.accept(&BlobRecord::new(10, vec![1])).await;
        assert!(matches!(result, Err(ContractError::DispatcherNotOpen { .. })));
    }
}
