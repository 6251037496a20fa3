//! Content registration: extract, synchronize, version

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use spf_common::metrics::PipelineMetrics;
use spf_common::queue::RegisterOptions;
use spf_common::records::{EventName, PackageManifest, StoredFile};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{Outcome, Pipelines, TempUpload};
use crate::errors::{IngressError, PackagingError, Result};
use crate::package;
use crate::paths::{folder_for_content, folder_for_package};
use crate::synchronizer::UpdateOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_v3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl From<&RegisterOptions> for UpdateOptions {
    fn from(options: &RegisterOptions) -> Self {
        Self {
            is_public: options.is_public,
            issue_id: options.issue_id.clone(),
            order: options.order.clone(),
            other_pids: options.other_pids.clone(),
        }
    }
}

impl Pipelines {
    /// Register a package's content, bring its article up to date and
    /// record a new files version.
    ///
    /// Once the ledger event is open the file at `file_path` is deleted
    /// whatever the outcome.
    #[instrument(skip(self, file_path, options), fields(path = %file_path.display()))]
    pub async fn register_content(
        &self,
        user_id: Uuid,
        file_path: &Path,
        options: &RegisterOptions,
    ) -> Result<Outcome<RegisterResponse>> {
        let metrics = PipelineMetrics::start("register_content");
        let event = self
            .ledger
            .begin(
                user_id,
                EventName::RegisterContent,
                Some(json!({ "file": file_name(file_path) })),
            )
            .await?;
        let upload = TempUpload::new(file_path);

        let result = self.register_package(upload.path(), options).await;
        self.settle(event, metrics, result, |err| RegisterResponse {
            errors: vec![err.to_string()],
            ..Default::default()
        })
        .await
    }

    async fn register_package(&self, path: &Path, options: &RegisterOptions) -> Result<RegisterResponse> {
        let (archive, mut sps) = package::load(path).await?;
        let pid_v3 = sps.metadata().pid_v3.clone().ok_or_else(|| {
            IngressError::InvalidPackageFormat(format!("{}: article-id scielo-v3 is missing", archive.name()))
        })?;
        let issn = sps.metadata().issn.clone().unwrap_or_default();

        let content = self
            .extractor
            .extract(&archive, &mut sps, &folder_for_content(&issn, &pid_v3))
            .await?;
        let xml = content
            .xml
            .ok_or_else(|| PackagingError::Unexpected("XML was not registered".to_string()))?;

        self.synchronizer
            .update(&pid_v3, sps.metadata(), &xml.uri, &content.renditions, &UpdateOptions::from(options))
            .await?;

        let prefix = folder_for_package(&issn, &pid_v3, Utc::now());
        let uri = self.registrar.register(path, &prefix, true).await?;

        let manifest = PackageManifest {
            xml,
            file: StoredFile::new(uri.clone(), file_name(path)),
            assets: content.assets,
            renditions: content.renditions,
        };
        let files = self.versioner.create(&pid_v3, &manifest).await?;

        info!(pid_v3 = %pid_v3, version = files.version, "Content registered");
        Ok(RegisterResponse {
            errors: Vec::new(),
            pid_v3: Some(pid_v3),
            version: Some(files.version),
            uri: Some(uri),
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::fixtures::{sample_package, write_zip, SAMPLE_XML};
    use crate::pipelines::testing::harness;
    use spf_common::db::MetadataStore;
    use spf_common::records::EventStatus;
    use spf_common::storage::InMemoryObjectStorage;

    #[tokio::test]
    async fn test_register_content_syncs_and_versions() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let dir = tempfile::tempdir().unwrap();
        let path = sample_package(dir.path(), "S0001.zip");
        let options = RegisterOptions {
            order: Some("7".to_string()),
            ..Default::default()
        };

        let outcome = h
            .pipelines
            .register_content(Uuid::new_v4(), &path, &options)
            .await
            .unwrap();
        assert_eq!(outcome.event.status, EventStatus::Completed);
        assert_eq!(outcome.response.version, Some(1));
        assert!(!path.exists());

        let article = h.store.find_article("S0001").await.unwrap().unwrap();
        assert_eq!(article.order, Some(7));
        assert_eq!(article.pdfs.len(), 2);
        assert!(article.is_public);
        let xml_uri = article.xml.unwrap();
        assert!(xml_uri.contains("/documents/1234-5678/S0001/"), "{xml_uri}");

        let files = h.store.list_article_files("S0001").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].xml.uri, xml_uri);
        assert_eq!(files[0].file.name, "S0001.zip");
        assert_eq!(files[0].assets.len(), 1);
        assert_eq!(files[0].renditions.len(), 2);
    }

    #[tokio::test]
    async fn test_second_registration_is_next_version() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let dir = tempfile::tempdir().unwrap();
        let user = Uuid::new_v4();

        for expected in 1..=2 {
            let path = sample_package(dir.path(), "S0001.zip");
            let outcome = h
                .pipelines
                .register_content(user, &path, &RegisterOptions::default())
                .await
                .unwrap();
            assert_eq!(outcome.response.version, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_unknown_document_fails_without_version() {
        let h = harness(InMemoryObjectStorage::default(), false).await;
        let dir = tempfile::tempdir().unwrap();
        let xml = SAMPLE_XML.replace("S0001", "S0404");
        let path = write_zip(dir.path(), "S0404.zip", &[("S0404.xml", xml.as_bytes())]);

        let outcome = h
            .pipelines
            .register_content(Uuid::new_v4(), &path, &RegisterOptions::default())
            .await
            .unwrap();
        assert!(outcome.failed());
        assert!(!outcome.transient);
        assert_eq!(
            outcome.event.annotation.as_ref().unwrap()["error_type"],
            "DocumentDoesNotExistError"
        );
        assert!(h.store.list_article_files("S0404").await.unwrap().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_xml_registration_failure_aborts() {
        let h = harness(InMemoryObjectStorage::default().failing_on(["S0001.xml"]), false).await;
        let dir = tempfile::tempdir().unwrap();
        let path = sample_package(dir.path(), "S0001.zip");

        let outcome = h
            .pipelines
            .register_content(Uuid::new_v4(), &path, &RegisterOptions::default())
            .await
            .unwrap();
        assert!(outcome.failed());
        assert!(outcome.transient);

        let article = h.store.find_article("S0001").await.unwrap().unwrap();
        assert_eq!(article.xml.as_deref(), Some("http://minio:9000/spf/S0001.xml"));
        assert!(h.store.list_article_files("S0001").await.unwrap().is_empty());
    }
}
