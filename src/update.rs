//! Version update check against the listings service
//!
//! The service publishes the latest released version and the minimum version
//! it still serves data to. Running below the minimum is fatal: the service
//! will be returning payloads this build cannot interpret correctly.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::UpdateError;

const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
struct VersionManifest {
    latest: String,
    minimum: String,
}

#[derive(Debug, PartialEq)]
pub enum UpdateStatus {
    UpToDate,
    UpgradeAvailable { latest: String },
}

/// Check the running version against the service's manifest
pub fn check(config: &Config) -> Result<UpdateStatus, UpdateError> {
    let url = format!(
        "{}?version={}",
        config.update.url,
        urlencoding::encode(CURRENT_VERSION)
    );
    debug!("checking for updates: {}", url);

    let client = reqwest::blocking::Client::builder()
        .user_agent(config.http.user_agent.clone())
        .timeout(Duration::from_secs(config.http.timeout_seconds))
        .build()
        .map_err(|e| UpdateError::Unreachable {
            message: e.to_string(),
        })?;
    let response = client
        .get(&url)
        .send()
        .map_err(|e| UpdateError::Unreachable {
            message: e.to_string(),
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(UpdateError::Unreachable {
            message: format!("HTTP {} from {}", status, url),
        });
    }
    let body = response.text().map_err(|e| UpdateError::Unreachable {
        message: e.to_string(),
    })?;

    let manifest: VersionManifest =
        serde_json::from_str(&body).map_err(|e| UpdateError::Unparsable {
            message: e.to_string(),
        })?;

    evaluate(CURRENT_VERSION, &manifest)
}

fn evaluate(current: &str, manifest: &VersionManifest) -> Result<UpdateStatus, UpdateError> {
    let current_parts = parse_version(current).ok_or_else(|| UpdateError::Unparsable {
        message: format!("running version '{}' is not dotted-numeric", current),
    })?;
    let minimum = parse_version(&manifest.minimum).ok_or_else(|| UpdateError::Unparsable {
        message: format!("minimum version '{}' is not dotted-numeric", manifest.minimum),
    })?;
    let latest = parse_version(&manifest.latest).ok_or_else(|| UpdateError::Unparsable {
        message: format!("latest version '{}' is not dotted-numeric", manifest.latest),
    })?;

    if version_less(&current_parts, &minimum) {
        return Err(UpdateError::UpgradeRequired {
            current: current.to_string(),
            minimum: manifest.minimum.clone(),
        });
    }
    if version_less(&current_parts, &latest) {
        return Ok(UpdateStatus::UpgradeAvailable {
            latest: manifest.latest.clone(),
        });
    }
    info!("version {} is up to date", current);
    Ok(UpdateStatus::UpToDate)
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    version
        .split('.')
        .map(|segment| segment.parse().ok())
        .collect()
}

/// Dotted-numeric comparison; missing segments count as zero
fn version_less(a: &[u64], b: &[u64]) -> bool {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        if left != right {
            return left < right;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(latest: &str, minimum: &str) -> VersionManifest {
        VersionManifest {
            latest: latest.to_string(),
            minimum: minimum.to_string(),
        }
    }

    #[test]
    fn test_up_to_date() {
        let status = evaluate("1.2.0", &manifest("1.2.0", "1.0.0")).unwrap();
        assert_eq!(status, UpdateStatus::UpToDate);
    }

    #[test]
    fn test_newer_build_than_published_is_up_to_date() {
        let status = evaluate("1.3.0", &manifest("1.2.0", "1.0.0")).unwrap();
        assert_eq!(status, UpdateStatus::UpToDate);
    }

    #[test]
    fn test_upgrade_available() {
        let status = evaluate("1.1.0", &manifest("1.2.0", "1.0.0")).unwrap();
        assert_eq!(
            status,
            UpdateStatus::UpgradeAvailable {
                latest: "1.2.0".to_string()
            }
        );
    }

    #[test]
    fn test_upgrade_required_below_minimum() {
        let err = evaluate("0.9.0", &manifest("1.2.0", "1.0.0")).unwrap_err();
        assert!(matches!(err, UpdateError::UpgradeRequired { .. }));
    }

    #[test]
    fn test_short_versions_compare_with_zero_padding() {
        let status = evaluate("1.2", &manifest("1.2.0", "1")).unwrap();
        assert_eq!(status, UpdateStatus::UpToDate);
    }

    #[test]
    fn test_non_numeric_manifest_is_unparsable() {
        let err = evaluate("1.2.0", &manifest("banana", "1.0.0")).unwrap_err();
        assert!(matches!(err, UpdateError::Unparsable { .. }));
    }
}
