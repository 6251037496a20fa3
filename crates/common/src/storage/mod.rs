//! Object storage client
//!
//! [`ObjectStorage`] uploads local files under `{spf_dir}/{prefix}/{filename}`
//! and hands back a stable URI of the form
//! `{scheme}://{host}/{collection}/{key}`.
//!
//! [`S3Storage`] talks to MinIO or S3 with path-style addressing and static
//! credentials. [`InMemoryObjectStorage`] keeps uploads in memory and can be
//! told to fail for chosen file names.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};

/// SDK attempts per operation (initial attempt plus retries)
const MAX_ATTEMPTS: u32 = 5;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `local_path` under `prefix` and return its URI.
    ///
    /// When `preserve_name` is false the file name is replaced by the
    /// SHA-256 of the content, keeping the extension.
    async fn upload(&self, local_path: &Path, prefix: &str, preserve_name: bool) -> Result<String>;
}

/// Object key for a file under `prefix`.
pub fn object_key(
    spf_dir: &str,
    prefix: &str,
    local_path: &Path,
    content: &[u8],
    preserve_name: bool,
) -> Result<String> {
    let file_name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Registration {
            key: local_path.display().to_string(),
            message: "path has no file name".to_string(),
        })?;

    let name = if preserve_name {
        file_name.to_string()
    } else {
        let digest = hex::encode(Sha256::digest(content));
        match local_path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{digest}.{ext}"),
            None => digest,
        }
    };

    Ok([spf_dir, prefix, name.as_str()]
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Public URI of an object key.
pub fn object_uri(config: &StorageConfig, key: &str) -> String {
    format!("{}/{}/{}", config.endpoint_url(), config.collection, key)
}

// ============================================================================
// S3 / MinIO
// ============================================================================

/// S3-compatible storage backend
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    config: StorageConfig,
}

impl S3Storage {
    /// Build a client from a validated storage configuration.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        config.validate()?;

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "spf-static",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.timeout())
                    .build(),
            )
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    #[instrument(skip(self), fields(bucket = %self.config.collection))]
    async fn upload(&self, local_path: &Path, prefix: &str, preserve_name: bool) -> Result<String> {
        let content = tokio::fs::read(local_path).await.map_err(|e| AppError::Registration {
            key: local_path.display().to_string(),
            message: e.to_string(),
        })?;
        let key = object_key(&self.config.spf_dir, prefix, local_path, &content, preserve_name)?;
        let content_type = mime_guess::from_path(local_path).first_or_octet_stream();

        self.client
            .put_object()
            .bucket(&self.config.collection)
            .key(&key)
            .content_type(content_type.essence_str())
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| map_s3_error(e, &key))?;

        debug!(key = %key, "Uploaded object");
        Ok(object_uri(&self.config, &key))
    }
}

/// Map an SDK error to a registration failure
fn map_s3_error<E: std::fmt::Debug>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> AppError {
    use aws_sdk_s3::error::SdkError;

    let message = match &err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            match status {
                403 => format!("access denied: {:?}", err),
                _ => format!("HTTP {}: {:?}", status, err),
            }
        }
        SdkError::TimeoutError(_) => format!("timeout: {:?}", err),
        SdkError::DispatchFailure(_) => format!("connection error: {:?}", err),
        _ => format!("{:?}", err),
    };

    AppError::Registration {
        key: key.to_string(),
        message,
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// An object recorded by [`InMemoryObjectStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub uri: String,
    pub content: Vec<u8>,
}

#[derive(Clone)]
pub struct InMemoryObjectStorage {
    config: StorageConfig,
    objects: Arc<Mutex<Vec<StoredObject>>>,
    fail_on: Arc<HashSet<String>>,
}

impl InMemoryObjectStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            objects: Arc::new(Mutex::new(Vec::new())),
            fail_on: Arc::new(HashSet::new()),
        }
    }

    /// Uploads of files with these names fail with a registration error.
    pub fn failing_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_on = Arc::new(names.into_iter().map(Into::into).collect());
        self
    }

    pub async fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().await.clone()
    }

    pub async fn get(&self, uri: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .iter()
            .find(|o| o.uri == uri)
            .map(|o| o.content.clone())
    }
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new(StorageConfig {
            host: "minio:9000".to_string(),
            access_key: "spf".to_string(),
            secret_key: "spf".to_string(),
            secure: false,
            timeout_ms: 1000,
            collection: "spf".to_string(),
            spf_dir: "spf".to_string(),
            region: "us-east-1".to_string(),
        })
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(&self, local_path: &Path, prefix: &str, preserve_name: bool) -> Result<String> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if self.fail_on.contains(file_name) {
            return Err(AppError::Registration {
                key: file_name.to_string(),
                message: "simulated upload failure".to_string(),
            });
        }

        let content = tokio::fs::read(local_path).await.map_err(|e| AppError::Registration {
            key: local_path.display().to_string(),
            message: e.to_string(),
        })?;
        let key = object_key(&self.config.spf_dir, prefix, local_path, &content, preserve_name)?;
        let uri = object_uri(&self.config, &key);

        let mut objects = self.objects.lock().await;
        objects.retain(|o| o.key != key);
        objects.push(StoredObject {
            key,
            uri: uri.clone(),
            content,
        });
        Ok(uri)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_object_key_preserves_name() {
        let key = object_key(
            "spf",
            "documents/1234-5678/S0001",
            Path::new("/tmp/x/fig1.jpg"),
            b"img",
            true,
        )
        .unwrap();
        assert_eq!(key, "spf/documents/1234-5678/S0001/fig1.jpg");
    }

    #[test]
    fn test_object_key_hashes_content_when_not_preserving() {
        let key = object_key("spf", "documents/x", Path::new("a.pdf"), b"abc", false).unwrap();
        assert_eq!(
            key,
            "spf/documents/x/ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.pdf"
        );
    }

    #[test]
    fn test_object_uri() {
        let storage = InMemoryObjectStorage::default();
        assert_eq!(
            object_uri(&storage.config, "spf/a.xml"),
            "http://minio:9000/spf/spf/a.xml"
        );
    }

    #[tokio::test]
    async fn test_in_memory_upload_and_fail_on() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        let bad = dir.path().join("bad.pdf");
        for path in [&good, &bad] {
            std::fs::File::create(path).unwrap().write_all(b"%PDF").unwrap();
        }

        let storage = InMemoryObjectStorage::default().failing_on(["bad.pdf"]);

        let uri = storage.upload(&good, "documents/x", true).await.unwrap();
        assert!(uri.ends_with("/spf/spf/documents/x/good.pdf"));
        assert_eq!(storage.get(&uri).await.as_deref(), Some(&b"%PDF"[..]));

        let err = storage.upload(&bad, "documents/x", true).await.unwrap_err();
        assert!(matches!(err, AppError::Registration { .. }));
        assert_eq!(storage.objects().await.len(), 1);
    }

    #[test]
    fn test_s3_storage_rejects_incomplete_config() {
        let err = S3Storage::new(&StorageConfig::default()).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
