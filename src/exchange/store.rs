// ABOUTME: Durable object store abstraction holding exchanged documents.
// ABOUTME: In-memory and local-directory backends; the AWS backend lives in aws.rs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::process::CommandError;

/// Well-known key the producer writes its exports to.
pub const DEFAULT_EXPORTS_KEY: &str = "pulumi-exports.json";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A bucket plus object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    bucket: String,
    key: String,
}

impl Location {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self, StoreError> {
        let bucket = bucket.into();
        let key = key.into();
        if bucket.trim().is_empty()
            || bucket.contains('/')
            || bucket == "."
            || bucket == ".."
        {
            return Err(StoreError::InvalidLocation(format!(
                "bucket name '{bucket}' must be non-empty, contain no '/' and not be '.' or '..'"
            )));
        }
        if key.trim().is_empty() || key.starts_with('/') {
            return Err(StoreError::InvalidLocation(format!(
                "object key '{key}' must be non-empty and relative"
            )));
        }
        Ok(Self { bucket, key })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// An object as read back from a store.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// When the object was last written, if the backend reports it.
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no object at {0}")]
    NotFound(Location),

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("I/O error at {location}: {source}")]
    Io {
        location: Location,
        source: std::io::Error,
    },

    #[error("object store backend failed for {location}: {message}")]
    Backend { location: Location, message: String },

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Shared durable object storage.
///
/// `put` overwrites unconditionally: the last writer wins and no history of
/// the previous content is kept. `get` on a missing object must return
/// `StoreError::NotFound`, never an empty body.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    async fn put(
        &self,
        location: &Location,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    async fn get(&self, location: &Location) -> Result<StoredObject, StoreError>;
}

/// Process-local store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<Location, StoredObject>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object with an explicit modification time.
    pub fn insert_at(&self, location: Location, body: Vec<u8>, last_modified: DateTime<Utc>) {
        self.objects.lock().insert(
            location,
            StoredObject {
                body,
                content_type: Some(JSON_CONTENT_TYPE.to_string()),
                last_modified: Some(last_modified),
            },
        );
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.objects.lock().contains_key(location)
    }

    /// Number of successful `put` calls so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(
        &self,
        location: &Location,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.objects.lock().insert(
            location.clone(),
            StoredObject {
                body,
                content_type: Some(content_type.to_string()),
                last_modified: Some(Utc::now()),
            },
        );
        *self.writes.lock() += 1;
        Ok(())
    }

    async fn get(&self, location: &Location) -> Result<StoredObject, StoreError> {
        self.objects
            .lock()
            .get(location)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(location.clone()))
    }
}

/// Store rooted at a local directory: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, location: &Location) -> Result<PathBuf, StoreError> {
        let bucket = Path::new(location.bucket());
        let mut parts = bucket.components();
        if !matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None)) {
            return Err(StoreError::InvalidLocation(format!(
                "bucket name '{}' must be a single directory name",
                location.bucket()
            )));
        }
        let key = Path::new(location.key());
        if key
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::InvalidLocation(format!(
                "object key '{}' may not contain '.', '..' or absolute components",
                location.key()
            )));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn put(
        &self,
        location: &Location,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.path_for(location)?;
        let io_err = |source| StoreError::Io {
            location: location.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        // Write beside the target and rename so readers never see a torn file.
        let mut staging = path.clone().into_os_string();
        staging.push(format!(".{}.tmp", std::process::id()));
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, &body).await.map_err(io_err)?;
        tokio::fs::rename(&staging, &path).await.map_err(io_err)?;

        tracing::debug!(path = %path.display(), bytes = body.len(), "wrote object");
        Ok(())
    }

    async fn get(&self, location: &Location) -> Result<StoredObject, StoreError> {
        let path = self.path_for(location)?;
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(location.clone()));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    location: location.clone(),
                    source,
                });
            }
        };

        let last_modified = tokio::fs::metadata(&path)
            .await
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(StoredObject {
            body,
            content_type: None,
            last_modified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_rejects_empty_parts() {
        assert!(Location::new("", "key").is_err());
        assert!(Location::new("bucket", "").is_err());
        assert!(Location::new("a/b", "key").is_err());
        assert!(Location::new("bucket", "/abs").is_err());
    }

    #[test]
    fn location_displays_bucket_and_key() {
        let loc = Location::new("exports", DEFAULT_EXPORTS_KEY).unwrap();
        assert_eq!(loc.to_string(), "exports/pulumi-exports.json");
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryStore::new();
        let loc = Location::new("b", "k").unwrap();
        store.put(&loc, b"one".to_vec(), JSON_CONTENT_TYPE).await.unwrap();
        store.put(&loc, b"two".to_vec(), JSON_CONTENT_TYPE).await.unwrap();
        assert_eq!(store.get(&loc).await.unwrap().body, b"two");
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn file_store_rejects_parent_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let loc = Location::new("b", "../escape.json").unwrap();
        let err = store.put(&loc, b"{}".to_vec(), JSON_CONTENT_TYPE).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidLocation(_)));
    }

    #[tokio::test]
    async fn dot_buckets_never_reach_the_file_store() {
        for bucket in [".", ".."] {
            assert!(matches!(
                Location::new(bucket, "escaped.json"),
                Err(StoreError::InvalidLocation(_))
            ));
        }

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let store = FileStore::new(&root);
        let forged = Location {
            bucket: "..".to_string(),
            key: "escaped.json".to_string(),
        };
        let err = store.put(&forged, b"{}".to_vec(), JSON_CONTENT_TYPE).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidLocation(_)));
        assert!(!dir.path().join("escaped.json").exists());
    }

    #[tokio::test]
    async fn file_store_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let loc = Location::new("b", "nested/k.json").unwrap();
        assert!(matches!(
            store.get(&loc).await.unwrap_err(),
            StoreError::NotFound(_)
        ));

        store.put(&loc, b"{}".to_vec(), JSON_CONTENT_TYPE).await.unwrap();
        let object = store.get(&loc).await.unwrap();
        assert_eq!(object.body, b"{}");
        assert!(object.last_modified.is_some());
    }
}
