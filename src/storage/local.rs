//! Filesystem-backed log storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use super::models::{LogFileMeta, StoredLogFile};
use crate::error::RelayError;

/// Fallback name for uploads without a usable file name.
const DEFAULT_FILE_NAME: &str = "log";

/// Log storage rooted at one directory.
///
/// Layout: `<root>/<file_id>.log` holds the contents and
/// `<root>/<file_id>.json` the [`LogFileMeta`] sidecar.
#[derive(Debug, Clone)]
pub struct LocalLogStorage {
    root: PathBuf,
}

impl LocalLogStorage {
    /// Opens storage at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`RelayError::StorageError`] if the directory cannot be
    /// created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, RelayError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!(root = %root.display(), "log storage ready");
        Ok(Self { root })
    }

    /// Returns the storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `bytes` under a fresh file id.
    ///
    /// # Errors
    ///
    /// Returns a [`RelayError::StorageError`] on filesystem failure.
    pub async fn create_file(&self, name: &str, bytes: &[u8]) -> Result<LogFileMeta, RelayError> {
        let meta = LogFileMeta {
            file_id: Uuid::new_v4(),
            name: sanitize_name(name),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };
        let sidecar = serde_json::to_vec(&meta)
            .map_err(|e| RelayError::StorageError(format!("encode metadata: {e}")))?;

        tokio::fs::write(self.data_path(meta.file_id), bytes).await?;
        if let Err(err) = tokio::fs::write(self.meta_path(meta.file_id), sidecar).await {
            let _ = tokio::fs::remove_file(self.data_path(meta.file_id)).await;
            return Err(err.into());
        }

        tracing::info!(file_id = %meta.file_id, name = %meta.name, size = meta.size, "log file stored");
        Ok(meta)
    }

    /// Opens the file stored under `file_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::FileNotFound`] for malformed or unknown ids,
    /// or a [`RelayError::StorageError`] on filesystem failure.
    pub async fn get_file(&self, file_id: &str) -> Result<StoredLogFile, RelayError> {
        let id = parse_file_id(file_id)?;
        let meta = self.read_meta(id, file_id).await?;
        let file = tokio::fs::File::open(self.data_path(id))
            .await
            .map_err(|e| not_found_or_storage(e, file_id))?;
        Ok(StoredLogFile { file, meta })
    }

    /// Deletes the file stored under `file_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::FileNotFound`] for malformed or unknown ids,
    /// or a [`RelayError::StorageError`] on filesystem failure.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), RelayError> {
        let id = parse_file_id(file_id)?;
        tokio::fs::remove_file(self.meta_path(id))
            .await
            .map_err(|e| not_found_or_storage(e, file_id))?;
        match tokio::fs::remove_file(self.data_path(id)).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::warn!(%file_id, "log file contents were already missing");
            }
            Err(err) => return Err(err.into()),
        }
        tracing::info!(%file_id, "log file deleted");
        Ok(())
    }

    async fn read_meta(&self, id: Uuid, raw: &str) -> Result<LogFileMeta, RelayError> {
        let bytes = tokio::fs::read(self.meta_path(id))
            .await
            .map_err(|e| not_found_or_storage(e, raw))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RelayError::StorageError(format!("corrupt metadata for {raw}: {e}")))
    }

    fn data_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.log"))
    }

    fn meta_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

fn parse_file_id(raw: &str) -> Result<Uuid, RelayError> {
    Uuid::parse_str(raw).map_err(|_| RelayError::FileNotFound(raw.to_string()))
}

fn not_found_or_storage(err: std::io::Error, file_id: &str) -> RelayError {
    if err.kind() == ErrorKind::NotFound {
        RelayError::FileNotFound(file_id.to_string())
    } else {
        err.into()
    }
}

/// Reduces a client-supplied name to its last path component, without
/// control characters so it stays valid in a `Content-Disposition` header.
fn sanitize_name(name: &str) -> String {
    let printable: String = name.chars().filter(|c| !c.is_control()).collect();
    Path::new(printable.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    async fn storage() -> LocalLogStorage {
        let root = std::env::temp_dir().join(format!("spy-relay-test-{}", Uuid::new_v4()));
        let Ok(storage) = LocalLogStorage::open(root).await else {
            panic!("storage should open");
        };
        storage
    }

    #[tokio::test]
    async fn stored_file_reads_back() {
        let storage = storage().await;
        let Ok(meta) = storage.create_file("session.log", b"console.log(1)").await else {
            panic!("create should succeed");
        };
        assert_eq!(meta.name, "session.log");
        assert_eq!(meta.size, 14);

        let Ok(mut stored) = storage.get_file(&meta.file_id.to_string()).await else {
            panic!("file should exist");
        };
        assert_eq!(stored.meta, meta);
        let mut contents = String::new();
        let Ok(_) = stored.file.read_to_string(&mut contents).await else {
            panic!("file should be readable");
        };
        assert_eq!(contents, "console.log(1)");
        let _ = tokio::fs::remove_dir_all(storage.root()).await;
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let storage = storage().await;
        let Ok(meta) = storage.create_file("a.log", b"x").await else {
            panic!("create should succeed");
        };
        let id = meta.file_id.to_string();
        assert!(storage.delete_file(&id).await.is_ok());
        assert!(matches!(
            storage.get_file(&id).await,
            Err(RelayError::FileNotFound(_))
        ));
        assert!(matches!(
            storage.delete_file(&id).await,
            Err(RelayError::FileNotFound(_))
        ));
        let _ = tokio::fs::remove_dir_all(storage.root()).await;
    }

    #[tokio::test]
    async fn malformed_id_is_not_found() {
        let storage = storage().await;
        assert!(matches!(
            storage.get_file("../etc/passwd").await,
            Err(RelayError::FileNotFound(_))
        ));
        let _ = tokio::fs::remove_dir_all(storage.root()).await;
    }

    #[test]
    fn names_are_reduced_to_file_name() {
        assert_eq!(sanitize_name("../../secret.log"), "secret.log");
        assert_eq!(sanitize_name("dir/trace.txt"), "trace.txt");
        assert_eq!(sanitize_name(""), DEFAULT_FILE_NAME);
        assert_eq!(sanitize_name(".."), DEFAULT_FILE_NAME);
    }

    #[test]
    fn control_characters_are_stripped() {
        let name = sanitize_name("trace\r\nSet-Cookie: x=1\t.log\u{7f}");
        assert_eq!(name, "traceSet-Cookie: x=1.log");
        assert_eq!(sanitize_name("\r\n"), DEFAULT_FILE_NAME);

        let header = format!("attachment; filename=\"{name}\"");
        assert!(axum::http::HeaderValue::from_str(&header).is_ok());
    }
}
