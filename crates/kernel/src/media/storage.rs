//! File storage backends.
//!
//! The kernel only depends on the trait contract: store bytes under a URI,
//! get a public URL back. A local filesystem backend ships in-tree; hosts
//! with object storage implement the trait themselves.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Datelike;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// File storage backend trait.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write data to storage at the given URI.
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()>;

    /// Read data from storage at the given URI.
    async fn read(&self, uri: &str) -> Result<Vec<u8>>;

    /// Delete a file from storage.
    async fn delete(&self, uri: &str) -> Result<()>;

    /// Check if a file exists.
    async fn exists(&self, uri: &str) -> Result<bool>;

    /// Get the public URL for a file.
    fn public_url(&self, uri: &str) -> String;

    /// Get the storage scheme (e.g., "local").
    fn scheme(&self) -> &'static str;
}

/// Expand the `%Y`/`%m`/`%d` tokens of an upload-path pattern.
///
/// Patterns come from the `media_upload_path` setting (e.g. `media/%Y/%m/`).
/// Only these three tokens are replaced; everything else passes through.
pub fn expand_upload_path(pattern: &str, now: chrono::DateTime<chrono::Utc>) -> String {
    pattern
        .replace("%Y", &format!("{:04}", now.year()))
        .replace("%m", &format!("{:02}", now.month()))
        .replace("%d", &format!("{:02}", now.day()))
}

/// Generate a storage URI for a new file under a dated directory pattern.
pub fn generate_uri(scheme: &str, pattern: &str, filename: &str) -> String {
    let dir = expand_upload_path(pattern, chrono::Utc::now());
    let dir = dir.trim_matches('/');
    let unique_id = Uuid::now_v7().simple().to_string();
    let safe_filename = sanitize_filename(filename);

    format!("{}://{}/{}_{}", scheme, dir, &unique_id[..8], safe_filename)
}

/// Sanitize a filename for safe storage.
///
/// Strips any path components and replaces everything outside a small safe
/// charset, closing off directory traversal through uploaded names.
pub fn sanitize_filename(filename: &str) -> String {
    use std::path::Path;

    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect::<String>()
        .chars()
        .take(200)
        .collect()
}

/// Local filesystem storage.
pub struct LocalFileStorage {
    /// Base path for file storage.
    base_path: PathBuf,
    /// Base URL for public file access.
    base_url: String,
}

impl LocalFileStorage {
    /// Create a new local file storage.
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
        }
    }

    /// Parse a local:// URI to get the relative path.
    ///
    /// Rejects paths containing `..` components to prevent directory traversal.
    fn parse_uri(&self, uri: &str) -> Result<PathBuf> {
        let path = uri
            .strip_prefix("local://")
            .context("invalid local URI, must start with local://")?;
        for component in std::path::Path::new(path).components() {
            if matches!(component, std::path::Component::ParentDir) {
                anyhow::bail!("directory traversal not allowed in storage URI");
            }
        }
        Ok(self.base_path.join(path))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()> {
        let path = self.parse_uri(uri)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        let mut file = fs::File::create(&path)
            .await
            .context("failed to create file")?;

        file.write_all(data).await.context("failed to write file")?;

        file.flush().await.context("failed to flush file")?;

        debug!(uri = %uri, path = ?path, size = data.len(), "file written");
        Ok(())
    }

    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.parse_uri(uri)?;
        let data = fs::read(&path).await.context("failed to read file")?;
        debug!(uri = %uri, size = data.len(), "file read");
        Ok(data)
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let path = self.parse_uri(uri)?;

        if path.exists() {
            fs::remove_file(&path)
                .await
                .context("failed to delete file")?;
            debug!(uri = %uri, "file deleted");
        } else {
            warn!(uri = %uri, "file not found for deletion");
        }

        Ok(())
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        let path = self.parse_uri(uri)?;
        Ok(path.exists())
    }

    fn public_url(&self, uri: &str) -> String {
        let path = uri.strip_prefix("local://").unwrap_or(uri);
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn scheme(&self) -> &'static str {
        "local"
    }
}

impl std::fmt::Debug for LocalFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStorage")
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test.jpg"), "test.jpg");
        assert_eq!(sanitize_filename("my file.jpg"), "my_file.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("test<script>.jpg"), "test_script_.jpg");
    }

    #[test]
    fn test_sanitize_filename_traversal_vectors() {
        // Unix-style traversal
        assert_eq!(sanitize_filename("../../../etc/shadow"), "shadow");
        // Windows-style backslash traversal (backslashes replaced with underscores on Unix)
        let result = sanitize_filename("..\\..\\windows\\system32\\config");
        assert!(!result.contains('\\'), "backslashes should be sanitized");
        // Null byte injection (stripped by Path::file_name)
        let result = sanitize_filename("shell.php\0.jpg");
        assert!(!result.contains('\0'));
        // Double encoding attempt: % is not in the allowed charset, replaced with _
        let result = sanitize_filename("..%2F..%2Fetc%2Fpasswd");
        assert!(!result.contains('%'), "percent signs should be sanitized");
        assert!(!result.contains('/'), "slashes should not appear");
    }

    #[test]
    fn test_expand_upload_path() {
        let now = chrono::DateTime::parse_from_rfc3339("2026-08-06T12:00:00Z")
            .unwrap()
            .to_utc();
        assert_eq!(expand_upload_path("media/%Y/%m/", now), "media/2026/08/");
        assert_eq!(
            expand_upload_path("files/%Y/%m/%d/", now),
            "files/2026/08/06/"
        );
        assert_eq!(expand_upload_path("flat/", now), "flat/");
    }

    #[test]
    fn test_generate_uri() {
        let uri = generate_uri("local", "media/%Y/%m/", "test.jpg");
        assert!(uri.starts_with("local://media/"));
        assert!(uri.ends_with("_test.jpg"));
    }

    #[test]
    fn test_public_url() {
        let storage = LocalFileStorage::new("/tmp/uploads", "https://example.com/files");
        let url = storage.public_url("local://media/2026/08/abc123_test.jpg");

        assert_eq!(url, "https://example.com/files/media/2026/08/abc123_test.jpg");
    }

    #[test]
    fn parse_uri_rejects_traversal() {
        let storage = LocalFileStorage::new("/tmp/uploads", "/files");
        assert!(storage.parse_uri("local://a/../../b").is_err());
        assert!(storage.parse_uri("media/x.jpg").is_err());
        assert!(storage.parse_uri("local://media/x.jpg").is_ok());
    }
}
