//! Raw package upload

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use spf_common::metrics::PipelineMetrics;
use spf_common::records::{EventName, FileDescriptor, ReceivedPackage};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{Outcome, Pipelines};
use crate::errors::{IngressError, Result};
use crate::package;
use crate::paths::folder_for_package;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_v3: Option<String>,
}

/// Removes an uploaded file when dropped.
///
/// Uploads are written to `{temp_dir}/{uuid}/{file name}`; the per-upload
/// directory goes too once it is empty.
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the file over to whoever processes it next.
    pub fn keep(mut self) -> PathBuf {
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed uploaded file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Unable to remove uploaded file"),
        }

        let upload_dir = self
            .path
            .parent()
            .filter(|dir| {
                dir.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| Uuid::parse_str(n).is_ok())
            });
        if let Some(dir) = upload_dir {
            let _ = std::fs::remove_dir(dir);
        }
    }
}

/// Reject names whose extension is not exactly `allowed`.
pub fn validate_package_name(name: &str, allowed: &str) -> Result<()> {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == allowed => Ok(()),
        _ => Err(IngressError::InvalidPackageFormat(format!(
            "{name}: only .{allowed} packages are accepted"
        ))),
    }
}

impl Pipelines {
    /// Store a submitted package as received.
    ///
    /// Once the ledger event is open the file at `file_path` is deleted
    /// whatever the outcome. If the event cannot be opened the file is left
    /// in place for a redelivery.
    #[instrument(skip(self, file_path), fields(path = %file_path.display()))]
    pub async fn upload(
        &self,
        user_id: Uuid,
        file_path: &Path,
        package_name: &str,
    ) -> Result<Outcome<UploadResponse>> {
        let metrics = PipelineMetrics::start("upload");
        let event = self
            .ledger
            .begin(
                user_id,
                EventName::UploadPackage,
                Some(json!({ "package_name": package_name })),
            )
            .await?;
        let upload = TempUpload::new(file_path);

        let result = self.store_upload(user_id, upload.path(), package_name).await;
        self.settle(event, metrics, result, |err| UploadResponse {
            errors: vec![err.to_string()],
            ..Default::default()
        })
        .await
    }

    async fn store_upload(&self, user_id: Uuid, path: &Path, package_name: &str) -> Result<UploadResponse> {
        validate_package_name(package_name, &self.allowed_extension)?;

        let (archive, sps) = package::load(path).await?;
        let metadata = sps.metadata();
        let pid_v3 = metadata
            .pid_v3
            .clone()
            .unwrap_or_else(|| archive.name().to_string());
        let issn = metadata.issn.clone().unwrap_or_default();

        let prefix = folder_for_package(&issn, &pid_v3, Utc::now());
        let uri = self.registrar.register(path, &prefix, true).await?;

        self.ledger.add_ingress_package(user_id, package_name).await?;
        self.store
            .save_received_package(&ReceivedPackage {
                id: pid_v3.clone(),
                file: FileDescriptor::new(Some(&uri), Some(package_name), None)?,
                updated: Utc::now(),
            })
            .await?;

        info!(pid_v3 = %pid_v3, uri = %uri, "Package received");
        Ok(UploadResponse {
            errors: Vec::new(),
            uri: Some(uri),
            name: Some(package_name.to_string()),
            pid_v3: Some(pid_v3),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::fixtures::sample_package;
    use crate::pipelines::testing::harness;
    use spf_common::db::MetadataStore;
    use spf_common::records::{EventStatus, IngressStatus, Scope};
    use spf_common::storage::InMemoryObjectStorage;

    #[test]
    fn test_package_name_validation() {
        assert!(validate_package_name("doc.zip", "zip").is_ok());
        assert!(validate_package_name("doc.txt", "zip").is_err());
        assert!(validate_package_name("doc.ZIP", "zip").is_err());
        assert!(validate_package_name("zip", "zip").is_err());
    }

    #[test]
    fn test_kept_upload_is_not_removed() {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().join(Uuid::new_v4().to_string());
        std::fs::create_dir(&upload_dir).unwrap();
        let kept = upload_dir.join("kept.zip");
        let dropped = upload_dir.join("dropped.zip");
        std::fs::write(&kept, b"PK").unwrap();
        std::fs::write(&dropped, b"PK").unwrap();

        assert_eq!(TempUpload::new(&kept).keep(), kept);
        drop(TempUpload::new(&dropped));

        assert!(kept.exists());
        assert!(!dropped.exists());
        assert!(upload_dir.exists());
    }

    #[tokio::test]
    async fn test_upload_stores_package() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let user = Uuid::new_v4();
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().join(Uuid::new_v4().to_string());
        std::fs::create_dir(&upload_dir).unwrap();
        let path = sample_package(&upload_dir, "doc.zip");

        let outcome = h.pipelines.upload(user, &path, "doc.zip").await.unwrap();
        assert_eq!(outcome.event.status, EventStatus::Completed);
        assert!(outcome.response.errors.is_empty());

        let uri = outcome.response.uri.unwrap();
        let prefix = "http://minio:9000/spf/spf/ingress/packages/1234-5678/S0001/";
        assert!(uri.starts_with(prefix), "{uri}");
        let rest: Vec<&str> = uri[prefix.len()..].split('/').collect();
        assert_eq!(rest.len(), 2);
        assert!(!rest[0].contains(':'));
        assert_eq!(rest[1], "doc.zip");

        let packages = h.pipelines.ledger().ingress_packages(Scope::new(user, false, None)).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].status, IngressStatus::Received);
        assert_eq!(packages[0].package_name, "doc.zip");

        let received = h.store.find_received_package("S0001").await.unwrap().unwrap();
        assert_eq!(received.file.uri, uri);

        assert!(!path.exists());
        assert!(!upload_dir.exists());
    }

    #[tokio::test]
    async fn test_non_zip_is_rejected_before_storage() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let user = Uuid::new_v4();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, b"not a package").unwrap();

        let outcome = h.pipelines.upload(user, &path, "doc.txt").await.unwrap();
        assert_eq!(outcome.event.status, EventStatus::Failed);
        assert_eq!(outcome.event.annotation.as_ref().unwrap()["error_type"], "InvalidPackageFormat");
        assert_eq!(outcome.response.errors.len(), 1);
        assert!(!outcome.transient);

        assert!(h.storage.objects().await.is_empty());
        assert!(h.store.list_ingress_packages(None).await.unwrap().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_kept_when_event_cannot_be_opened() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let dir = tempfile::tempdir().unwrap();
        let path = sample_package(dir.path(), "doc.zip");

        h.store.set_events_offline(true);
        let err = h.pipelines.upload(Uuid::new_v4(), &path, "doc.zip").await.unwrap_err();
        assert!(err.is_transient());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_storage_failure_is_recorded_and_transient() {
        let h = harness(InMemoryObjectStorage::default().failing_on(["doc.zip"]), false).await;
        let dir = tempfile::tempdir().unwrap();
        let path = sample_package(dir.path(), "doc.zip");

        let outcome = h.pipelines.upload(Uuid::new_v4(), &path, "doc.zip").await.unwrap();
        assert!(outcome.failed());
        assert!(outcome.transient);
        assert!(h.store.list_ingress_packages(None).await.unwrap().is_empty());
        assert!(!path.exists());
    }
}
