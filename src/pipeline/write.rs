//! Stage 7: write the normalized document to content-addressed storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::StorageError;

/// ENOSPC on Linux and macOS alike; there is no portable stable
/// `ErrorKind` for "out of disk space" yet, so the raw errno is checked
/// alongside `ErrorKind::WriteZero` (what a short write surfaces as).
const ENOSPC: i32 = 28;

fn classify_io_error(path: String, source: std::io::Error) -> StorageError {
    let disk_full =
        source.kind() == ErrorKind::WriteZero || source.raw_os_error() == Some(ENOSPC);
    if disk_full {
        StorageError::DiskFull { path }
    } else {
        StorageError::WriteFailure { path, source }
    }
}

#[derive(Debug, Clone)]
pub struct WriteResult {
    pub url_hash: String,
    pub path: PathBuf,
    pub content_hash: String,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn write(
        &self,
        output_dir: &Path,
        url_hash: &str,
        content_hash: &str,
        content: &str,
    ) -> Result<WriteResult, StorageError>;
}

/// Writes one Markdown file per page under `outputDir`, named after the
/// hash of the page's canonical URL so re-crawls overwrite in place.
#[derive(Debug, Default)]
pub struct FileSystemStorage;

impl FileSystemStorage {
    fn file_name(url_hash: &str) -> String {
        let safe = sanitize_filename::sanitize(url_hash);
        format!("{safe}.md")
    }
}

#[async_trait]
impl Storage for FileSystemStorage {
    async fn write(
        &self,
        output_dir: &Path,
        url_hash: &str,
        content_hash: &str,
        content: &str,
    ) -> Result<WriteResult, StorageError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| classify_io_error(output_dir.display().to_string(), source))?;

        let path = output_dir.join(Self::file_name(url_hash));
        tokio::fs::write(&path, content.as_bytes())
            .await
            .map_err(|source| classify_io_error(path.display().to_string(), source))?;

        Ok(WriteResult {
            url_hash: url_hash.to_string(),
            path,
            content_hash: content_hash.to_string(),
        })
    }
}
