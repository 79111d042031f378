//! Filesystem helpers shared by the scoped stores.
//!
//! Records are replaced atomically (hidden temp file in the same directory,
//! `fsync`, `rename`) and index read-modify-write cycles are serialized across
//! processes with an advisory lock on a sibling lock file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lorekeep_core::{KnowledgeError, KnowledgeResult};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Advisory lock over one scope's base directory.
pub(crate) type DirLock = fd_lock::RwLock<File>;

/// Pause between `try_write` attempts while another handle holds the lock.
pub(crate) const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Open (creating if needed) the lock file at `path`.
///
/// Callers poll `try_write` and hold the guard for the whole
/// read-modify-write cycle.
pub(crate) fn open_lock(path: &Path) -> KnowledgeResult<DirLock> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| {
            KnowledgeError::Store(format!("Failed to open lock file '{}': {e}", path.display()))
        })?;
    Ok(fd_lock::RwLock::new(file))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}

/// Whether `path` is one of our in-flight temp files.
pub(crate) fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(".tmp"))
}

async fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, path).await
}

/// Replace the contents of `path` so readers see either the old or the new bytes.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> KnowledgeResult<()> {
    let tmp = temp_path_for(path);
    if let Err(e) = write_then_rename(&tmp, path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub(crate) async fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> KnowledgeResult<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json).await
}

/// Read a file, mapping "does not exist" to `None`.
pub(crate) async fn read_optional(path: &Path) -> KnowledgeResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        // Non-UTF-8 bytes are a malformed record, not an I/O failure.
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Ok(Some(String::new())),
        Err(e) => Err(e.into()),
    }
}

/// Remove a file, returning whether it existed.
pub(crate) async fn remove_if_exists(path: &Path) -> KnowledgeResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
