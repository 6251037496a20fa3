//! Versioned article files

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::file::{FileDescriptor, RenditionEntry};
use crate::errors::Result;

/// An immutable package version of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFiles {
    pub id: Uuid,
    pub aid: String,
    pub version: i32,
    pub scielo_pids: BTreeMap<String, String>,
    pub xml: FileDescriptor,
    pub file: FileDescriptor,
    pub assets: Vec<FileDescriptor>,
    pub renditions: Vec<RenditionFile>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Rendition descriptor stored on a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionFile {
    #[serde(flatten)]
    pub file: FileDescriptor,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

impl RenditionFile {
    pub fn from_entry(entry: &RenditionEntry) -> Result<Self> {
        Ok(Self {
            file: entry.to_descriptor()?,
            mimetype: entry.mimetype.clone(),
            lang: entry.lang.clone(),
            kind: entry.kind.clone(),
            size_bytes: entry.size_bytes,
        })
    }
}

/// Article files ready to persist; the store assigns `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticleFiles {
    pub aid: String,
    pub scielo_pids: BTreeMap<String, String>,
    pub xml: FileDescriptor,
    pub file: FileDescriptor,
    pub assets: Vec<FileDescriptor>,
    pub renditions: Vec<RenditionFile>,
}

impl NewArticleFiles {
    pub fn into_version(self, version: i32) -> ArticleFiles {
        let now = Utc::now();
        ArticleFiles {
            id: Uuid::now_v7(),
            aid: self.aid,
            version,
            scielo_pids: self.scielo_pids,
            xml: self.xml,
            file: self.file,
            assets: self.assets,
            renditions: self.renditions,
            created: now,
            updated: now,
        }
    }
}
