//! Ingress error types

use spf_common::errors::AppError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngressError>;

/// Failures of the package builder and XML reader
#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("Unable to build package: {0}")]
    Build(String),

    #[error("Package I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected packaging failure: {0}")]
    Unexpected(String),
}

impl PackagingError {
    pub fn kind(&self) -> &'static str {
        match self {
            PackagingError::MalformedXml(_) => "MalformedXml",
            PackagingError::Build(_) => "Build",
            PackagingError::Io(_) => "Io",
            PackagingError::Unexpected(_) => "Unexpected",
        }
    }
}

impl From<zip::result::ZipError> for PackagingError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => PackagingError::Io(e),
            other => PackagingError::Build(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for PackagingError {
    fn from(err: reqwest::Error) -> Self {
        PackagingError::Build(format!("download failed: {err}"))
    }
}

#[derive(Error, Debug)]
pub enum IngressError {
    #[error("Invalid package format: {0}")]
    InvalidPackageFormat(String),

    #[error("Unable to read package {path}: {message}")]
    PackageRead { path: String, message: String },

    #[error(transparent)]
    Packaging(#[from] PackagingError),

    #[error(transparent)]
    App(#[from] AppError),
}

impl IngressError {
    /// Stable name recorded in FAILED ledger annotations
    pub fn kind(&self) -> &'static str {
        match self {
            IngressError::InvalidPackageFormat(_) => "InvalidPackageFormat",
            IngressError::PackageRead { .. } => "PackageReadError",
            IngressError::Packaging(e) => e.kind(),
            IngressError::App(e) => e.kind(),
        }
    }

    /// Whether a later delivery of the same task could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IngressError::App(
                AppError::Registration { .. }
                    | AppError::Database(_)
                    | AppError::DatabaseConnection { .. }
                    | AppError::QueueError { .. }
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        let err = IngressError::from(PackagingError::MalformedXml("unclosed tag".into()));
        assert_eq!(err.kind(), "MalformedXml");

        let err = IngressError::from(AppError::DocumentNotFound { id: "S0001".into() });
        assert_eq!(err.kind(), "DocumentDoesNotExistError");
        assert_eq!(err.to_string(), "Document S0001 does not exist");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_storage_failures_are_transient() {
        let err = IngressError::from(AppError::Registration {
            key: "a.zip".into(),
            message: "timeout".into(),
        });
        assert!(err.is_transient());
        assert!(!IngressError::InvalidPackageFormat("doc.txt".into()).is_transient());
    }
}
