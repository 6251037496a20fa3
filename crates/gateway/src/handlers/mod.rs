//! API handlers module

pub mod health;
pub mod ledger;
pub mod packages;

use spf_common::errors::AppError;
use spf_ingress::IngressError;

/// Surface a pipeline infrastructure failure as an API error.
pub fn app_error(err: IngressError) -> AppError {
    match err {
        IngressError::App(e) => e,
        other => AppError::Internal {
            message: other.to_string(),
        },
    }
}
