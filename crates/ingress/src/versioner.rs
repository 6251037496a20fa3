//! Article files versioning

use std::collections::BTreeMap;
use std::sync::Arc;

use spf_common::db::{version_after, MetadataStore};
use spf_common::errors::Result;
use spf_common::records::{ArticleFiles, NewArticleFiles, PackageManifest, RenditionFile};
use tracing::{info, instrument};

#[derive(Clone)]
pub struct Versioner {
    store: Arc<dyn MetadataStore>,
}

impl Versioner {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Version the next `create` is expected to receive.
    ///
    /// Informational only: [`Versioner::create`] takes its number from the
    /// store, which serializes concurrent writers per document.
    pub async fn next_version(&self, pid_v3: &str) -> Result<i32> {
        let count = self.store.count_article_files(pid_v3).await?;
        version_after(count)
    }

    /// Persist a new immutable version of a document's files.
    ///
    /// Every descriptor is built before anything is written.
    #[instrument(skip(self, manifest))]
    pub async fn create(&self, pid_v3: &str, manifest: &PackageManifest) -> Result<ArticleFiles> {
        let files = NewArticleFiles {
            aid: pid_v3.to_string(),
            scielo_pids: BTreeMap::from([("v3".to_string(), pid_v3.to_string())]),
            xml: manifest.xml.to_descriptor()?,
            file: manifest.file.to_descriptor()?,
            assets: manifest
                .assets
                .iter()
                .map(|a| a.to_descriptor())
                .collect::<Result<_>>()?,
            renditions: manifest
                .renditions
                .iter()
                .map(RenditionFile::from_entry)
                .collect::<Result<_>>()?,
        };

        let created = self.store.insert_article_files(files).await?;
        info!(version = created.version, "Article files version created");
        Ok(created)
    }
}
