//! Blob storage for listing images.
//!
//! Clients upload image bytes directly against a presigned token obtained
//! out-of-band, before the catalog ever hears about the key. The catalog
//! side only needs deletion, so that is the whole `ObjectStore` trait; the
//! disk-backed implementation additionally carries the presign/upload/read
//! surface used by the upload endpoints. Payloads live sharded beneath
//! `base_path/{shard}/{shard}/{key}`.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{Duration, Utc};
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("blob `{0}` not found")]
    BlobNotFound(String),
    #[error("invalid object key")]
    InvalidKey,
    #[error("upload token is malformed or carries a bad signature")]
    InvalidToken,
    #[error("upload token has expired")]
    TokenExpired,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// What the listing workflow needs from blob storage: deletion by key.
///
/// Implementations must treat an already-missing blob as success so the
/// caller's best-effort cleanup stays idempotent.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn delete_object(&self, key: &str) -> ObjectStoreResult<()>;
}

/// Metadata of a blob written through the upload path.
#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub key: String,
    pub size_bytes: i64,
    pub etag: String,
}

/// Local-disk object store.
///
/// Presigned upload tokens are `base64(expiry:signature:key)` where the
/// signature is an md5 over the expiry, key, and a server-side secret. Good
/// enough to keep casual callers from writing arbitrary keys; swap in an
/// HMAC if the store ever faces the open internet directly.
pub struct DiskObjectStore {
    /// Base directory on disk where blobs are stored.
    pub base_path: PathBuf,

    token_secret: String,
    token_ttl: Duration,
}

impl DiskObjectStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        token_secret: impl Into<String>,
        token_ttl_secs: i64,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            token_secret: token_secret.into(),
            token_ttl: Duration::seconds(token_ttl_secs),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(ObjectStoreError::InvalidKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(ObjectStoreError::InvalidKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ObjectStoreError::InvalidKey);
        }
        Ok(())
    }

    /// Two-level shard identifiers derived from md5(key), keeping the file
    /// count per directory bounded.
    fn shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    fn signature(&self, expires: i64, key: &str) -> String {
        format!(
            "{:x}",
            md5::compute(format!("{}:{}:{}", expires, key, self.token_secret))
        )
    }

    /// Issue a time-limited upload token for `key`.
    pub fn presign_upload(&self, key: &str) -> ObjectStoreResult<String> {
        Self::ensure_key_safe(key)?;
        let expires = (Utc::now() + self.token_ttl).timestamp();
        let signature = self.signature(expires, key);
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(format!("{}:{}:{}", expires, signature, key)))
    }

    /// Validate an upload token and return the key it grants access to.
    pub fn verify_upload_token(&self, token: &str) -> ObjectStoreResult<String> {
        let raw = general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(ObjectStoreError::InvalidToken)?;

        let mut parts = raw.splitn(3, ':');
        let expires: i64 = parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or(ObjectStoreError::InvalidToken)?;
        let signature = parts.next().ok_or(ObjectStoreError::InvalidToken)?;
        let key = parts.next().ok_or(ObjectStoreError::InvalidToken)?;

        if signature != self.signature(expires, key) {
            return Err(ObjectStoreError::InvalidToken);
        }
        if expires < Utc::now().timestamp() {
            return Err(ObjectStoreError::TokenExpired);
        }
        Self::ensure_key_safe(key)?;
        Ok(key.to_string())
    }

    /// Stream a blob to disk.
    ///
    /// Writes into a temporary file, computes size and md5 etag while
    /// streaming, fsyncs, then atomically renames into place. Overwrites of
    /// an existing key keep S3-like last-write-wins semantics. Temp files
    /// are removed on every failure path.
    pub async fn put_object_stream<S>(&self, key: &str, stream: S) -> ObjectStoreResult<StoredBlob>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::ensure_key_safe(key)?;

        let file_path = self.blob_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::new(
                ErrorKind::Other,
                "blob path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(ObjectStoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        }

        Ok(StoredBlob {
            key: key.to_string(),
            size_bytes,
            etag: format!("{:x}", digest.compute()),
        })
    }

    /// Open a blob for streaming out, returning its size alongside.
    pub async fn open_object(&self, key: &str) -> ObjectStoreResult<(File, u64)> {
        Self::ensure_key_safe(key)?;
        let file_path = self.blob_path(key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::BlobNotFound(key.to_string())
            } else {
                ObjectStoreError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Recursively remove empty shard directories up to the store root.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn delete_object(&self, key: &str) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(key)?;
        let file_path = self.blob_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed blob {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("blob {} already missing", file_path.display());
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn temp_store(ttl_secs: i64) -> DiskObjectStore {
        let base = std::env::temp_dir().join(format!("marketplace-store-{}", Uuid::new_v4()));
        DiskObjectStore::new(base, "test-secret", ttl_secs)
    }

    fn byte_stream(data: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream::iter(vec![Ok(Bytes::from_static(data))])
    }

    #[tokio::test]
    async fn put_then_open_round_trips() {
        let store = temp_store(60);
        let blob = store
            .put_object_stream("u1/pic.jpg", byte_stream(b"jpeg bytes"))
            .await
            .unwrap();
        assert_eq!(blob.size_bytes, 10);

        let (_, len) = store.open_object("u1/pic.jpg").await.unwrap();
        assert_eq!(len, 10);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = temp_store(60);
        store
            .put_object_stream("u1/pic.jpg", byte_stream(b"x"))
            .await
            .unwrap();

        store.delete_object("u1/pic.jpg").await.unwrap();
        // missing blob is still success
        store.delete_object("u1/pic.jpg").await.unwrap();
        assert!(matches!(
            store.open_object("u1/pic.jpg").await,
            Err(ObjectStoreError::BlobNotFound(_))
        ));
    }

    #[test]
    fn presign_round_trips_and_rejects_tampering() {
        let store = temp_store(60);
        let token = store.presign_upload("u1/pic.jpg").unwrap();
        assert_eq!(store.verify_upload_token(&token).unwrap(), "u1/pic.jpg");

        let forged = DiskObjectStore::new(store.base_path.clone(), "other-secret", 60)
            .presign_upload("u1/pic.jpg")
            .unwrap();
        assert!(matches!(
            store.verify_upload_token(&forged),
            Err(ObjectStoreError::InvalidToken)
        ));
        assert!(matches!(
            store.verify_upload_token("not-base64!"),
            Err(ObjectStoreError::InvalidToken)
        ));
    }

    #[test]
    fn presign_expires() {
        let store = temp_store(-5);
        let token = store.presign_upload("u1/pic.jpg").unwrap();
        assert!(matches!(
            store.verify_upload_token(&token),
            Err(ObjectStoreError::TokenExpired)
        ));
    }

    #[test]
    fn unsafe_keys_are_rejected() {
        let store = temp_store(60);
        for bad in ["", "/abs", "a/../b", "a\\b"] {
            assert!(store.presign_upload(bad).is_err(), "key `{}`", bad);
        }
    }
}
