//! File descriptors and package manifests

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

/// A file registered in object storage, as recorded on article files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl FileDescriptor {
    /// Build a descriptor from its parts.
    ///
    /// At least one of `uri`/`name` must be present, and neither may carry
    /// control characters.
    pub fn new(uri: Option<&str>, name: Option<&str>, annotation: Option<&str>) -> Result<Self> {
        let uri = uri.map(str::trim).unwrap_or_default();
        let name = name.map(str::trim).unwrap_or_default();

        if uri.is_empty() && name.is_empty() {
            return Err(AppError::Descriptor {
                message: "uri and name are both empty".to_string(),
            });
        }
        if let Some(bad) = [uri, name].into_iter().find(|v| v.chars().any(char::is_control)) {
            return Err(AppError::Descriptor {
                message: format!("control character in {bad:?}"),
            });
        }

        Ok(Self {
            uri: uri.to_string(),
            name: name.to_string(),
            annotation: annotation.map(str::to_string),
        })
    }
}

/// `{uri, name}` pair produced by registering a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub uri: String,
    pub name: String,
}

impl StoredFile {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
        }
    }

    pub fn to_descriptor(&self) -> Result<FileDescriptor> {
        FileDescriptor::new(Some(&self.uri), Some(&self.name), None)
    }
}

/// A registered PDF rendition.
///
/// Accepts `url` as an alias of `uri` so entries coming back from the
/// article record deserialize the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionEntry {
    pub name: String,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(alias = "url")]
    pub uri: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

impl RenditionEntry {
    pub fn to_descriptor(&self) -> Result<FileDescriptor> {
        FileDescriptor::new(Some(&self.uri), Some(&self.name), None)
    }
}

/// Content registered out of a single package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentManifest {
    pub assets: Vec<StoredFile>,
    pub renditions: Vec<RenditionEntry>,
    pub xml: Option<StoredFile>,
}

/// Everything a new article files version points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub xml: StoredFile,
    pub file: StoredFile,
    #[serde(default)]
    pub assets: Vec<StoredFile>,
    #[serde(default)]
    pub renditions: Vec<RenditionEntry>,
}
