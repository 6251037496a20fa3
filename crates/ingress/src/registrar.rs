//! Object storage registrar

use std::path::Path;
use std::sync::Arc;

use spf_common::errors::Result;
use spf_common::metrics::record_registration;
use spf_common::storage::ObjectStorage;
use tracing::{debug, warn};

/// Uploads local files and classifies failures.
///
/// Callers decide whether a [`AppError::Registration`](spf_common::AppError)
/// is fatal: assets and renditions are skipped, XML and package zips abort.
#[derive(Clone)]
pub struct Registrar {
    storage: Arc<dyn ObjectStorage>,
}

impl Registrar {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    pub async fn register(&self, local_path: &Path, prefix: &str, preserve_name: bool) -> Result<String> {
        match self.storage.upload(local_path, prefix, preserve_name).await {
            Ok(uri) => {
                record_registration(true);
                debug!(uri = %uri, "Registered file");
                Ok(uri)
            }
            Err(e) => {
                record_registration(false);
                warn!(path = %local_path.display(), prefix, error = %e, "Registration failed");
                Err(e)
            }
        }
    }
}

/// Last path segment of a URI.
pub fn uri_basename(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spf_common::storage::InMemoryObjectStorage;
    use spf_common::AppError;

    #[tokio::test]
    async fn test_register_propagates_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.zip");
        std::fs::write(&path, b"PK").unwrap();

        let registrar = Registrar::new(Arc::new(InMemoryObjectStorage::default().failing_on(["doc.zip"])));
        let err = registrar.register(&path, "ingress/packages", true).await.unwrap_err();
        assert!(matches!(err, AppError::Registration { .. }));
    }

    #[test]
    fn test_uri_basename() {
        assert_eq!(uri_basename("http://minio:9000/spf/a/b/fig1.jpg"), "fig1.jpg");
        assert_eq!(uri_basename("fig1.jpg"), "fig1.jpg");
    }
}
