//! SciELO PS packages
//!
//! Reading (zip archive, XML tree, bibliographic metadata) and building
//! distributable packages from registered files.

pub mod archive;
pub mod builder;
pub mod metadata;
pub mod xml;

#[cfg(test)]
pub(crate) mod fixtures;

pub use archive::{ZipPackage, ORIGINAL_RENDITION};
pub use builder::{BuiltPackage, HttpPackageBuilder, PackageBuilder};
pub use metadata::{Author, PackageMetadata};

use std::path::Path;

use quick_xml::escape::escape;

use crate::errors::{IngressError, PackagingError};

/// Elements whose `xlink:href` points at a package asset
pub const ASSET_ELEMENTS: &[&str] = &[
    "graphic",
    "inline-graphic",
    "media",
    "supplementary-material",
    "inline-supplementary-material",
];

/// A parsed XML document with its metadata.
#[derive(Debug, Clone)]
pub struct SpsPackage {
    xml: String,
    root: xml::Element,
    metadata: PackageMetadata,
}

impl SpsPackage {
    pub fn parse(xml: String) -> Result<Self, PackagingError> {
        let root = xml::parse(&xml)?;
        let metadata = PackageMetadata::from_root(&root);
        Ok(Self { xml, root, metadata })
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn into_xml(self) -> String {
        self.xml
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    /// Distinct asset references, in document order.
    pub fn asset_hrefs(&self) -> Vec<String> {
        let mut hrefs: Vec<String> = Vec::new();
        for element in self.root.descendants() {
            if !ASSET_ELEMENTS.contains(&element.name.as_str()) {
                continue;
            }
            if let Some(href) = element.attr("xlink:href").map(str::trim) {
                if !href.is_empty() && !hrefs.iter().any(|h| h == href) {
                    hrefs.push(href.to_string());
                }
            }
        }
        hrefs
    }

    /// Point every `xlink:href` whose trimmed value is `old` at `new`.
    ///
    /// Works on the raw text so the rest of the document is left byte for
    /// byte as submitted.
    pub fn replace_asset_href(&mut self, old: &str, new: &str) {
        const ATTR: &str = "xlink:href=";
        let old = escape(old.trim()).into_owned();
        let new = escape(new).into_owned();

        let mut out = String::with_capacity(self.xml.len());
        let mut rest = self.xml.as_str();
        while let Some(pos) = rest.find(ATTR) {
            let value_start = pos + ATTR.len();
            out.push_str(&rest[..value_start]);
            rest = &rest[value_start..];

            let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
                continue;
            };
            let body = &rest[1..];
            let Some(end) = body.find(quote) else {
                continue;
            };
            let value = &body[..end];
            out.push(quote);
            out.push_str(if value.trim() == old { new.as_str() } else { value });
            out.push(quote);
            rest = &body[end + 1..];
        }
        out.push_str(rest);
        self.xml = out;
    }
}

/// Open a zip package and parse its XML.
pub async fn load(path: &Path) -> Result<(ZipPackage, SpsPackage), IngressError> {
    let path = path.to_path_buf();
    let (archive, xml) = tokio::task::spawn_blocking(move || {
        let archive = ZipPackage::open(&path)?;
        let xml = archive.read_xml()?;
        Ok::<_, IngressError>((archive, xml))
    })
    .await
    .map_err(|e| PackagingError::Unexpected(e.to_string()))??;

    Ok((archive, SpsPackage::parse(xml)?))
}
