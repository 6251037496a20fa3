//! Storage path planning
//!
//! Raw package deposits land under
//! `ingress/packages/{issn}/{pid_v3}/{timestamp}` so repeated uploads of the
//! same file never collide. Extracted content lands under
//! `documents/{issn}/{pid_v3}`, which is stable across runs.

use chrono::{DateTime, Utc};

pub const PACKAGES_ROOT: &str = "ingress/packages";
pub const CONTENT_ROOT: &str = "documents";

/// UTC timestamp in ISO-8601 form with the colons stripped.
pub fn timestamp_folder(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string().replace(':', "")
}

pub fn folder_for_package(issn: &str, pid_v3: &str, now: DateTime<Utc>) -> String {
    join(&[PACKAGES_ROOT, issn, pid_v3, &timestamp_folder(now)])
}

pub fn folder_for_content(issn: &str, pid_v3: &str) -> String {
    join(&[CONTENT_ROOT, issn, pid_v3])
}

// Empty segments are dropped rather than producing `//`.
fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
