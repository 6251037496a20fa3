//! Package content extraction
//!
//! Registers a package's assets, renditions and XML one item at a time.
//! Each item is extracted into its own scratch directory, removed as soon as
//! that item is registered (or fails to be).

use std::path::{Path, PathBuf};

use spf_common::errors::AppError;
use spf_common::metrics::record_skipped;
use spf_common::records::{ContentManifest, RenditionEntry, StoredFile};
use tracing::{debug, info, instrument, warn};

use crate::errors::{PackagingError, Result};
use crate::package::{SpsPackage, ZipPackage, ORIGINAL_RENDITION};
use crate::registrar::{uri_basename, Registrar};

const PDF_MIMETYPE: &str = "application/pdf";

#[derive(Clone)]
pub struct ContentExtractor {
    registrar: Registrar,
}

impl ContentExtractor {
    pub fn new(registrar: Registrar) -> Self {
        Self { registrar }
    }

    /// Register everything in `archive` under `prefix`.
    ///
    /// Asset references are rewritten in `package` to the registered URIs
    /// before the XML itself is registered.
    #[instrument(skip(self, archive, package), fields(package = archive.name()))]
    pub async fn extract(
        &self,
        archive: &ZipPackage,
        package: &mut SpsPackage,
        prefix: &str,
    ) -> Result<ContentManifest> {
        let assets = self.register_assets(archive, package, prefix).await?;
        let renditions = self
            .register_renditions(archive, package.metadata().primary_lang(), prefix)
            .await?;
        let xml = self.register_xml(archive.name(), package.xml(), prefix).await?;

        info!(
            assets = assets.len(),
            renditions = renditions.len(),
            xml = %xml.uri,
            "Package content registered"
        );

        Ok(ContentManifest {
            assets,
            renditions,
            xml: Some(xml),
        })
    }

    async fn register_assets(
        &self,
        archive: &ZipPackage,
        package: &mut SpsPackage,
        prefix: &str,
    ) -> Result<Vec<StoredFile>> {
        let mut assets = Vec::new();

        for href in package.asset_hrefs() {
            let Some(entry) = archive.asset_entry(&href) else {
                debug!(href = %href, "Asset not bundled, skipping");
                continue;
            };

            let scratch = scratch_dir()?;
            let path = extract_to(archive, entry, scratch.path()).await?;
            match self.registrar.register(&path, prefix, true).await {
                Ok(uri) => {
                    package.replace_asset_href(&href, &uri);
                    assets.push(StoredFile::new(uri.clone(), uri_basename(&uri)));
                }
                Err(e @ AppError::Registration { .. }) => {
                    warn!(href = %href, error = %e, "Asset not registered, skipping");
                    record_skipped("asset");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(assets)
    }

    async fn register_renditions(
        &self,
        archive: &ZipPackage,
        primary_lang: &str,
        prefix: &str,
    ) -> Result<Vec<RenditionEntry>> {
        let mut renditions = Vec::new();

        for (key, entry) in archive.renditions() {
            let scratch = scratch_dir()?;
            let path = extract_to(archive, &entry, scratch.path()).await?;
            let size_bytes = tokio::fs::metadata(&path)
                .await
                .map_err(PackagingError::from)?
                .len();
            let mimetype = mime_guess::from_path(&path)
                .first_raw()
                .unwrap_or(PDF_MIMETYPE)
                .to_string();
            let lang = if key == ORIGINAL_RENDITION {
                primary_lang.to_string()
            } else {
                key
            };

            match self.registrar.register(&path, prefix, true).await {
                Ok(uri) => renditions.push(RenditionEntry {
                    name: uri_basename(&entry).to_string(),
                    mimetype: Some(mimetype),
                    lang: Some(lang),
                    kind: Some("pdf".to_string()),
                    uri,
                    size_bytes: Some(size_bytes),
                }),
                Err(e @ AppError::Registration { .. }) => {
                    warn!(entry = %entry, error = %e, "Rendition not registered, skipping");
                    record_skipped("rendition");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(renditions)
    }

    /// Write `xml` to `{name}.xml` and register it. Failures propagate.
    async fn register_xml(&self, name: &str, xml: &str, prefix: &str) -> Result<StoredFile> {
        let scratch = scratch_dir()?;
        let file_name = format!("{name}.xml");
        let path = scratch.path().join(&file_name);
        tokio::fs::write(&path, xml)
            .await
            .map_err(PackagingError::from)?;

        let uri = self.registrar.register(&path, prefix, true).await?;
        Ok(StoredFile::new(uri, file_name))
    }
}

fn scratch_dir() -> Result<tempfile::TempDir> {
    Ok(tempfile::Builder::new()
        .prefix("spf-item-")
        .tempdir()
        .map_err(PackagingError::from)?)
}

async fn extract_to(archive: &ZipPackage, entry: &str, dir: &Path) -> Result<PathBuf> {
    let (archive, entry, dir) = (archive.clone(), entry.to_string(), dir.to_path_buf());
    tokio::task::spawn_blocking(move || archive.extract_entry(&entry, &dir))
        .await
        .map_err(|e| PackagingError::Unexpected(e.to_string()))?
}
