//! Object storage
//!
//! `StorageClient` validates uploads (size limit, folder, filename) and builds
//! keys and public URLs; the bytes go to an [`ObjectStore`] backend. The shipped
//! backend keeps objects on the local filesystem as `{root}/{bucket}/{key}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fgm_common::{uuid_utils, Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Bytes written per progress report
const CHUNK_SIZE: usize = 64 * 1024;

/// Default and maximum keys per listing page
pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 1000;

/// Upload progress callback: `(bytes_written, total_bytes)`
pub type Progress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedObject {
    pub url: String,
    pub key: String,
    pub bucket: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// One page of a listing, in lexicographic key order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectPage {
    pub objects: Vec<ObjectSummary>,
    /// Pass back as `continuation` to fetch the next page
    pub next_continuation: Option<String>,
}

/// Storage backend
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        progress: Option<Progress<'_>>,
    ) -> Result<()>;

    /// Remove an object; a missing key is not an error
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Keys starting with `prefix` that sort after `continuation`
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectPage>;
}

/// Filesystem-backed [`ObjectStore`]
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.root.join(bucket);
        path.extend(key.split('/'));
        path
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        progress: Option<Progress<'_>>,
    ) -> Result<()> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let total = data.len() as u64;
        let mut file = tokio::fs::File::create(&path).await?;
        let mut written = 0u64;

        if data.is_empty() {
            if let Some(report) = progress {
                report(0, 0);
            }
        }

        for chunk in data.chunks(CHUNK_SIZE) {
            file.write_all(chunk).await?;
            written += chunk.len() as u64;
            if let Some(report) = progress {
                report(written, total);
            }
        }

        file.flush().await?;
        debug!("Stored {} bytes at {}", total, path.display());
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Delete of missing object ignored: {}", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectPage> {
        let bucket_root = self.root.join(bucket);
        let prefix = prefix.to_string();
        let after = continuation.map(str::to_string);

        let mut objects = tokio::task::spawn_blocking(move || {
            scan_bucket(&bucket_root, &prefix, after.as_deref())
        })
        .await
        .map_err(|e| Error::Internal(format!("Listing task failed: {}", e)))?;

        objects.sort_by(|a, b| a.key.cmp(&b.key));

        let next_continuation = if objects.len() > max_keys {
            objects.truncate(max_keys);
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_continuation,
        })
    }
}

fn scan_bucket(bucket_root: &Path, prefix: &str, after: Option<&str>) -> Vec<ObjectSummary> {
    if !bucket_root.is_dir() {
        return Vec::new();
    }

    let mut objects = Vec::new();
    for entry in WalkDir::new(bucket_root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing stored object: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(bucket_root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if !key.starts_with(prefix) || after.is_some_and(|a| key.as_str() <= a) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        objects.push(ObjectSummary {
            key,
            size: metadata.len(),
            last_modified,
        });
    }
    objects
}

/// Reject empty, absolute and parent-relative paths
fn validate_path(kind: &str, path: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(Error::InvalidInput(format!(
            "Invalid {} '{}': {}",
            kind, path, reason
        )))
    };

    if path.trim().is_empty() {
        return invalid("must not be empty");
    }
    if path.starts_with('/') || path.contains('\\') || path.contains(':') {
        return invalid("must be a relative path");
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return invalid("contains an empty or relative segment");
    }
    Ok(())
}

/// Keep the last path component and replace anything outside `[A-Za-z0-9._-]`
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized.to_string()
    }
}

/// Content type from the file extension
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "m3u8" => "application/vnd.apple.mpegurl",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Upload front end over an [`ObjectStore`]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    public_base_url: String,
    max_upload_bytes: u64,
}

impl StorageClient {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            max_upload_bytes,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, key)
    }

    /// Store `data` under `{folder}/{uuid}-{filename}`
    pub async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        folder: &str,
        content_type: Option<&str>,
        progress: Option<Progress<'_>>,
    ) -> Result<UploadedObject> {
        let size = data.len() as u64;
        if size > self.max_upload_bytes {
            return Err(Error::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        let folder = folder.trim_end_matches('/');
        validate_path("folder", folder)?;

        let filename = sanitize_filename(filename);
        let key = format!("{}/{}-{}", folder, uuid_utils::generate_id(), filename);
        let content_type = content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| content_type_for(&filename))
            .to_string();

        self.store.put(&self.bucket, &key, data, progress).await?;

        info!("Uploaded {} ({} bytes) to {}", key, size, self.bucket);

        Ok(UploadedObject {
            url: self.public_url(&key),
            key,
            bucket: self.bucket.clone(),
            filename,
            size,
            content_type,
        })
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        validate_path("key", key)?;
        self.store.delete(&self.bucket, key).await?;
        info!("Deleted {} from {}", key, self.bucket);
        Ok(())
    }

    pub async fn list(
        &self,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: Option<usize>,
    ) -> Result<ObjectPage> {
        let max_keys = max_keys
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        self.store
            .list(&self.bucket, prefix, continuation, max_keys)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("clip 01.mp4"), "clip_01.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\videos\\intro.webm"), "intro.webm");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn test_validate_folder() {
        assert!(validate_path("folder", "videos").is_ok());
        assert!(validate_path("folder", "videos/2024").is_ok());
        assert!(validate_path("folder", "").is_err());
        assert!(validate_path("folder", "/abs").is_err());
        assert!(validate_path("folder", "a/../b").is_err());
        assert!(validate_path("folder", "a//b").is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("intro.MP4"), "video/mp4");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_local_put_reports_progress_per_chunk() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let data = vec![7u8; CHUNK_SIZE * 2 + 10];

        let reports = Mutex::new(Vec::new());
        let record = |written: u64, total: u64| reports.lock().unwrap().push((written, total));

        store
            .put("bucket", "videos/a.bin", &data, Some(&record))
            .await
            .unwrap();

        let reports = reports.into_inner().unwrap();
        let total = data.len() as u64;
        assert_eq!(
            reports,
            vec![
                (CHUNK_SIZE as u64, total),
                (CHUNK_SIZE as u64 * 2, total),
                (total, total)
            ]
        );
        let stored = std::fs::read(dir.path().join("bucket/videos/a.bin")).unwrap();
        assert_eq!(stored.len(), data.len());
    }

    #[tokio::test]
    async fn test_local_delete_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.delete("bucket", "nope/missing.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_local_list_pages_in_key_order() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());
        for key in ["b/2.txt", "a/1.txt", "b/1.txt", "c/1.txt"] {
            store.put("bucket", key, b"x", None).await.unwrap();
        }

        let first = store.list("bucket", "", None, 2).await.unwrap();
        let keys: Vec<_> = first.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a/1.txt", "b/1.txt"]);
        assert_eq!(first.next_continuation.as_deref(), Some("b/1.txt"));

        let second = store
            .list("bucket", "", first.next_continuation.as_deref(), 2)
            .await
            .unwrap();
        let keys: Vec<_> = second.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["b/2.txt", "c/1.txt"]);
        assert!(second.next_continuation.is_none());

        let prefixed = store.list("bucket", "b/", None, 10).await.unwrap();
        assert_eq!(prefixed.objects.len(), 2);
    }
}
