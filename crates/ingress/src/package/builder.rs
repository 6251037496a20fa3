//! Distributable package builder
//!
//! Downloads a registered XML, the remote assets it references and its
//! renditions, then writes them into `{pid_v3}.zip` with asset references
//! rewritten to the bundled file names.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use spf_common::records::{RenditionEntry, StoredFile};
use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;

use super::SpsPackage;
use crate::errors::PackagingError;

/// A zip written by a [`PackageBuilder`]
#[derive(Debug, Clone)]
pub struct BuiltPackage {
    pub path: PathBuf,
    /// Remote assets bundled into the zip
    pub assets: Vec<StoredFile>,
}

#[async_trait]
pub trait PackageBuilder: Send + Sync {
    /// Build `{out_dir}/{pid_v3}.zip`.
    async fn build(
        &self,
        pid_v3: &str,
        xml_uri: &str,
        renditions: &[RenditionEntry],
        out_dir: &Path,
    ) -> Result<BuiltPackage, PackagingError>;
}

/// Builds packages from files reachable over HTTP(S).
#[derive(Clone)]
pub struct HttpPackageBuilder {
    client: reqwest::Client,
    max_elapsed: Duration,
}

impl HttpPackageBuilder {
    pub fn new(timeout: Duration) -> Result<Self, PackagingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PackagingError::Unexpected(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_elapsed: timeout * 3,
        })
    }

    /// GET with exponential backoff; client errors are not retried.
    async fn download(&self, uri: &str) -> Result<Vec<u8>, PackagingError> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let bytes = backoff::future::retry(policy, || async {
            let response = self
                .client
                .get(uri)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(PackagingError::from(e)))?;

            let status = response.status();
            if status.is_client_error() {
                return Err(backoff::Error::permanent(PackagingError::Build(format!(
                    "GET {uri} returned {status}"
                ))));
            }
            if !status.is_success() {
                warn!(uri, %status, "Download failed, retrying");
                return Err(backoff::Error::transient(PackagingError::Build(format!(
                    "GET {uri} returned {status}"
                ))));
            }

            response
                .bytes()
                .await
                .map_err(|e| backoff::Error::transient(PackagingError::from(e)))
        })
        .await?;

        debug!(uri, size = bytes.len(), "Downloaded");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PackageBuilder for HttpPackageBuilder {
    #[instrument(skip(self, renditions, out_dir))]
    async fn build(
        &self,
        pid_v3: &str,
        xml_uri: &str,
        renditions: &[RenditionEntry],
        out_dir: &Path,
    ) -> Result<BuiltPackage, PackagingError> {
        let xml = String::from_utf8(self.download(xml_uri).await?)
            .map_err(|e| PackagingError::MalformedXml(format!("{xml_uri}: {e}")))?;
        let mut package = SpsPackage::parse(xml)?;

        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        let mut assets = Vec::new();
        for href in package.asset_hrefs() {
            if !is_remote(&href) {
                continue;
            }
            let name = file_name_from_uri(&href);
            if name.is_empty() {
                continue;
            }
            files.push((name.clone(), self.download(&href).await?));
            package.replace_asset_href(&href, &name);
            assets.push(StoredFile::new(href.clone(), name));
        }

        for rendition in renditions {
            let name = file_name_from_uri(&rendition.name);
            let name = if name.is_empty() {
                file_name_from_uri(&rendition.uri)
            } else {
                name
            };
            files.push((name, self.download(&rendition.uri).await?));
        }

        files.insert(0, (format!("{pid_v3}.xml"), package.into_xml().into_bytes()));

        let target = out_dir.join(format!("{pid_v3}.zip"));
        let path = target.clone();
        tokio::task::spawn_blocking(move || write_package(&path, &files))
            .await
            .map_err(|e| PackagingError::Unexpected(e.to_string()))??;

        info!(path = %target.display(), assets = assets.len(), "Package built");
        Ok(BuiltPackage {
            path: target,
            assets,
        })
    }
}

fn is_remote(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

/// Last path segment of a URI, without query or fragment.
pub fn file_name_from_uri(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Write `files` into a new zip at `path`. Blocking.
pub fn write_package(path: &Path, files: &[(String, Vec<u8>)]) -> Result<(), PackagingError> {
    let mut writer = zip::ZipWriter::new(std::fs::File::create(path)?);
    let options = SimpleFileOptions::default();
    let mut seen = std::collections::HashSet::new();
    for (name, content) in files {
        if !seen.insert(name.as_str()) {
            continue;
        }
        writer.start_file(name.as_str(), options)?;
        writer.write_all(content)?;
    }
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::ZipPackage;

    #[test]
    fn test_file_name_from_uri() {
        assert_eq!(file_name_from_uri("http://minio:9000/spf/a/fig1.jpg"), "fig1.jpg");
        assert_eq!(file_name_from_uri("http://minio:9000/spf/a/S0001.pdf?x=1#p"), "S0001.pdf");
        assert_eq!(file_name_from_uri("S0001-pt.pdf"), "S0001-pt.pdf");
        assert_eq!(file_name_from_uri(""), "");
    }

    #[test]
    fn test_write_package_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S0001.zip");
        let files = vec![
            ("S0001.xml".to_string(), b"<article xml:lang=\"en\"/>".to_vec()),
            ("S0001.pdf".to_string(), b"%PDF".to_vec()),
            ("S0001.pdf".to_string(), b"duplicate".to_vec()),
        ];
        write_package(&path, &files).unwrap();

        let package = ZipPackage::open(&path).unwrap();
        assert_eq!(package.name(), "S0001");
        assert_eq!(package.renditions().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_xml_is_a_build_error() {
        let builder = HttpPackageBuilder::new(Duration::from_millis(100)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = builder
            .build("S0001", "http://127.0.0.1:9/S0001.xml", &[], dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "Build");
    }
}
