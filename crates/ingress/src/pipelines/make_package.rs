//! Distributable package creation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use spf_common::errors::AppError;
use spf_common::metrics::PipelineMetrics;
use spf_common::records::{EventName, PackageManifest, RenditionEntry, StoredFile};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{Outcome, Pipelines};
use crate::errors::{PackagingError, Result};
use crate::paths::folder_for_package;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub uri: String,
    pub name: String,
    pub version: i32,
    pub created: DateTime<Utc>,
}

/// `{"package": {...}}` on success, `{"error": "..."}` otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageResponse {
    Package(PackageInfo),
    Error(String),
}

/// Registered XML and PDFs of an article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleUris {
    pub xml: StoredFile,
    pub renditions: Vec<RenditionEntry>,
}

impl Pipelines {
    /// XML and rendition URIs currently recorded on `pid_v3`.
    pub async fn article_uris_and_names(&self, pid_v3: &str) -> Result<ArticleUris> {
        let article = self
            .store
            .find_article(pid_v3)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound {
                id: pid_v3.to_string(),
            })?;

        let xml_uri = article.xml.unwrap_or_default();
        let renditions = article
            .pdfs
            .into_iter()
            .map(|pdf| RenditionEntry {
                name: pdf.name,
                mimetype: pdf.mimetype,
                lang: pdf.lang,
                kind: pdf.kind,
                uri: pdf.url,
                size_bytes: pdf.size_bytes,
            })
            .collect();

        Ok(ArticleUris {
            xml: StoredFile::new(xml_uri, format!("{pid_v3}.xml")),
            renditions,
        })
    }

    /// Build, register and version a distributable package for `pid_v3`.
    ///
    /// Without `xml_uri` the article's own XML and PDFs are packaged and
    /// `renditions` is ignored.
    #[instrument(skip(self, renditions))]
    pub async fn make_package(
        &self,
        user_id: Uuid,
        pid_v3: &str,
        xml_uri: Option<&str>,
        renditions: &[RenditionEntry],
    ) -> Result<Outcome<PackageResponse>> {
        let metrics = PipelineMetrics::start("make_package");
        let event = self
            .ledger
            .begin(
                user_id,
                EventName::MakePackage,
                Some(json!({ "pid_v3": pid_v3, "xml_uri": xml_uri })),
            )
            .await?;

        let result = self.build_package(pid_v3, xml_uri, renditions).await;
        self.settle(event, metrics, result.map(PackageResponse::Package), |err| {
            PackageResponse::Error(err.to_string())
        })
        .await
    }

    async fn build_package(
        &self,
        pid_v3: &str,
        xml_uri: Option<&str>,
        renditions: &[RenditionEntry],
    ) -> Result<PackageInfo> {
        let (xml, renditions) = match xml_uri {
            Some(uri) => (
                StoredFile::new(uri, format!("{pid_v3}.xml")),
                renditions.to_vec(),
            ),
            None => {
                let uris = self.article_uris_and_names(pid_v3).await?;
                (uris.xml, uris.renditions)
            }
        };

        let scratch = tempfile::Builder::new()
            .prefix("spf-package-")
            .tempdir()
            .map_err(PackagingError::from)?;
        let built = self
            .builder
            .build(pid_v3, &xml.uri, &renditions, scratch.path())
            .await?;

        let article = self
            .store
            .find_article(pid_v3)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound {
                id: pid_v3.to_string(),
            })?;
        let issn = match article.journal_id.as_deref() {
            Some(journal_id) => self
                .store
                .find_journal(journal_id)
                .await?
                .ok_or_else(|| AppError::JournalNotFound {
                    id: journal_id.to_string(),
                })?
                .issn()
                .map(str::to_string)
                .unwrap_or_default(),
            None => String::new(),
        };

        let prefix = folder_for_package(&issn, pid_v3, Utc::now());
        let uri = self.registrar.register(&built.path, &prefix, true).await?;
        let name = format!("{pid_v3}.zip");

        let manifest = PackageManifest {
            xml,
            file: StoredFile::new(uri.clone(), name.clone()),
            assets: built.assets,
            renditions,
        };
        let files = self.versioner.create(pid_v3, &manifest).await?;

        info!(pid_v3, version = files.version, uri = %uri, "Package made");
        Ok(PackageInfo {
            uri,
            name,
            version: files.version,
            created: files.created,
        })
    }
}
