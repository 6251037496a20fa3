//! Zip package archive access
//!
//! A package holds one XML document (`{name}.xml`), its PDF renditions
//! (`{name}.pdf` for the original language, `{name}-{lang}.pdf` for
//! translations) and the assets the XML references. Every call reopens the
//! archive, so a [`ZipPackage`] is cheap to clone into blocking tasks.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::errors::{IngressError, Result};

/// Rendition key for the document's primary language
pub const ORIGINAL_RENDITION: &str = "original";

#[derive(Debug, Clone)]
pub struct ZipPackage {
    path: PathBuf,
    name: String,
    xml_entry: String,
    entries: Vec<String>,
}

fn basename(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry)
}

fn stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

fn has_extension(file_name: &str, ext: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, e)| e.eq_ignore_ascii_case(ext))
}

impl ZipPackage {
    /// Index the archive at `path`. Blocking.
    pub fn open(path: &Path) -> Result<Self> {
        let archive = Self::archive(path)?;
        let entries: Vec<String> = archive
            .file_names()
            .filter(|n| !n.ends_with('/') && !n.starts_with("__MACOSX"))
            .map(str::to_string)
            .collect();

        let xml_entry = entries
            .iter()
            .filter(|n| has_extension(n, "xml"))
            .min()
            .cloned()
            .ok_or_else(|| {
                IngressError::InvalidPackageFormat(format!(
                    "{} has no XML document",
                    path.display()
                ))
            })?;
        let name = stem(basename(&xml_entry)).to_string();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            xml_entry,
            entries,
        })
    }

    fn archive(path: &Path) -> Result<ZipArchive<File>> {
        let read_error = |message: String| IngressError::PackageRead {
            path: path.display().to_string(),
            message,
        };
        let file = File::open(path).map_err(|e| read_error(e.to_string()))?;
        ZipArchive::new(file).map_err(|e| read_error(e.to_string()))
    }

    /// Document name, the XML file stem
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_xml(&self) -> Result<String> {
        let mut archive = Self::archive(&self.path)?;
        let mut entry = archive
            .by_name(&self.xml_entry)
            .map_err(|e| self.read_error(e.to_string()))?;
        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| self.read_error(e.to_string()))?;
        Ok(xml)
    }

    /// Entry an XML asset reference points at.
    ///
    /// Matches by file name; a reference without extension matches any
    /// non-XML, non-PDF entry with the same stem.
    pub fn asset_entry(&self, href: &str) -> Option<&str> {
        let wanted = basename(href);
        if wanted.is_empty() {
            return None;
        }
        let exact = self.entries.iter().find(|e| basename(e) == wanted);
        let by_stem = || {
            if wanted.contains('.') {
                return None;
            }
            self.entries.iter().find(|e| {
                let file = basename(e);
                stem(file) == wanted && !has_extension(file, "xml") && !has_extension(file, "pdf")
            })
        };
        exact.or_else(by_stem).map(String::as_str)
    }

    /// `(language key, entry)` pairs, `original` for the main rendition.
    pub fn renditions(&self) -> Vec<(String, String)> {
        let prefix = format!("{}-", self.name);
        let mut out: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|e| has_extension(e, "pdf"))
            .filter_map(|entry| {
                let file_stem = stem(basename(entry));
                if file_stem == self.name {
                    Some((ORIGINAL_RENDITION.to_string(), entry.clone()))
                } else {
                    file_stem
                        .strip_prefix(&prefix)
                        .filter(|lang| !lang.is_empty())
                        .map(|lang| (lang.to_string(), entry.clone()))
                }
            })
            .collect();
        out.sort_by(|a, b| (a.0 != ORIGINAL_RENDITION, &a.0).cmp(&(b.0 != ORIGINAL_RENDITION, &b.0)));
        out
    }

    /// Copy one entry into `dir` under its base name. Blocking.
    pub fn extract_entry(&self, entry: &str, dir: &Path) -> Result<PathBuf> {
        let mut archive = Self::archive(&self.path)?;
        let mut source = archive
            .by_name(entry)
            .map_err(|e| self.read_error(e.to_string()))?;
        let target = dir.join(basename(entry));
        let mut out = File::create(&target).map_err(|e| self.read_error(e.to_string()))?;
        std::io::copy(&mut source, &mut out).map_err(|e| self.read_error(e.to_string()))?;
        Ok(target)
    }

    fn read_error(&self, message: String) -> IngressError {
        IngressError::PackageRead {
            path: self.path.display().to_string(),
            message,
        }
    }
}
