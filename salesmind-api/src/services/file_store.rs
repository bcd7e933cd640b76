//! Tenant-isolated audio storage on the local filesystem
//!
//! Layout: `{base}/{user_id}/{client_id}/{token}_{timestamp}.{ext}`. The
//! stored name never contains client-supplied text beyond the allow-listed
//! extension.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Accepted audio extensions (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["mp3", "wav", "m4a", "ogg", "flac", "mp4"];

/// Upload ceiling
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Default age after which stored audio is pruned
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported file type '{extension}'. Accepted: mp3, wav, m4a, ogg, flac, mp4")]
    UnsupportedFileType { extension: String },

    #[error("File exceeds the maximum size of {max_bytes} bytes")]
    FileTooLarge { max_bytes: u64 },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one cleanup pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
    max_file_size: u64,
    retention: Duration,
}

impl FileStore {
    /// Open a store rooted at `base_dir`, creating the directory if absent
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            max_file_size: MAX_FILE_SIZE,
            retention: DEFAULT_RETENTION,
        })
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Validated, lower-cased extension of `filename`
    pub fn allowed_extension(filename: &str) -> Result<String, StorageError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            Ok(extension)
        } else {
            Err(StorageError::UnsupportedFileType { extension })
        }
    }

    /// Stream `reader` into a fresh file for (`user_id`, `client_id`)
    ///
    /// The extension is checked before anything touches the disk. A stream
    /// that exceeds the size ceiling leaves no file behind.
    pub async fn save_file<R>(
        &self,
        mut reader: R,
        original_filename: &str,
        user_id: i64,
        client_id: i64,
    ) -> Result<PathBuf, StorageError>
    where
        R: AsyncRead + Unpin,
    {
        let extension = Self::allowed_extension(original_filename)?;

        let dir = self
            .base_dir
            .join(user_id.to_string())
            .join(client_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let token = Uuid::new_v4().simple().to_string();
        let filename = format!(
            "{}_{}.{}",
            &token[..8],
            Utc::now().format("%Y%m%dT%H%M%S%3f"),
            extension
        );
        let path = dir.join(filename);

        match self.copy_limited(&mut reader, &path).await {
            Ok(written) => {
                debug!(path = %path.display(), bytes = written, "Stored upload");
                Ok(path)
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            path = %path.display(),
                            error = %remove_err,
                            "Failed to remove partial upload"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn copy_limited<R>(&self, reader: &mut R, path: &Path) -> Result<u64, StorageError>
    where
        R: AsyncRead + Unpin,
    {
        let mut file = tokio::fs::File::create(path).await?;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            written += n as u64;
            if written > self.max_file_size {
                return Err(StorageError::FileTooLarge {
                    max_bytes: self.max_file_size,
                });
            }
            file.write_all(&buffer[..n]).await?;
        }

        file.flush().await?;
        Ok(written)
    }

    /// Best-effort removal of a stored file
    pub async fn delete_file(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to delete stored file");
        }
    }

    /// Delete files older than the retention window
    ///
    /// Never fails: unreadable entries and failed deletions are logged and
    /// counted in the report.
    pub async fn cleanup_old_files(&self) -> CleanupReport {
        let base_dir = self.base_dir.clone();
        let retention = self.retention;

        match tokio::task::spawn_blocking(move || cleanup_blocking(&base_dir, retention)).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Cleanup task did not complete");
                CleanupReport::default()
            }
        }
    }
}

fn cleanup_blocking(base_dir: &Path, retention: Duration) -> CleanupReport {
    sweep_expired(base_dir, retention, |path| std::fs::remove_file(path))
}

/// Walk `base_dir` and hand every file older than `retention` to `remove`
fn sweep_expired<F>(base_dir: &Path, retention: Duration, mut remove: F) -> CleanupReport
where
    F: FnMut(&Path) -> std::io::Result<()>,
{
    let mut report = CleanupReport::default();
    let Some(cutoff) = SystemTime::now().checked_sub(retention) else {
        return report;
    };

    for entry in WalkDir::new(base_dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry during cleanup");
                report.failed += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            Ok(Err(e)) => {
                warn!(path = %entry.path().display(), error = %e, "No modification time");
                report.failed += 1;
                continue;
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Metadata unavailable");
                report.failed += 1;
                continue;
            }
        };

        if modified < cutoff {
            match remove(entry.path()) {
                Ok(()) => {
                    debug!(path = %entry.path().display(), "Removed expired audio");
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to remove expired audio");
                    report.failed += 1;
                }
            }
        }
    }

    if report.removed > 0 || report.failed > 0 {
        info!(
            removed = report.removed,
            failed = report.failed,
            "Storage cleanup finished"
        );
    }
    report
}
