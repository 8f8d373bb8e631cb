use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub services: ServicesConfig,
    pub http: HttpConfig,
    pub time: TimeConfig,
    pub update: UpdateConfig,
}

/// Listings service endpoints. `base_url` hosts the title, category and
/// override payloads; the series and movie services are optional and their
/// absence degrades the corresponding stages rather than failing the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub base_url: String,
    pub series_url: Option<String>,
    pub movies_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// IANA timezone used to interpret timestamps without an offset suffix
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    pub enabled: bool,
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services: ServicesConfig {
                base_url: "https://listings.nice.net.nz/augment".to_string(),
                series_url: Some("https://listings.nice.net.nz/series".to_string()),
                movies_url: None,
            },
            http: HttpConfig {
                user_agent: concat!("xmltv-augment/", env!("CARGO_PKG_VERSION")).to_string(),
                timeout_seconds: 30,
            },
            time: TimeConfig {
                timezone: "Pacific/Auckland".to_string(),
            },
            update: UpdateConfig {
                enabled: true,
                url: "https://listings.nice.net.nz/augment/version.json".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path))?;
            toml::from_str(&contents).with_context(|| format!("parsing config file {}", path))
        } else {
            debug!("config file {} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Resolve the configured feed timezone
    pub fn timezone(&self) -> Result<Tz> {
        self.time
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid timezone '{}': {}", self.time.timezone, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timezone_resolves() {
        let config = Config::default();
        assert_eq!(config.timezone().unwrap(), chrono_tz::Pacific::Auckland);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.services.base_url, config.services.base_url);
        assert_eq!(parsed.update.enabled, config.update.enabled);
    }
}
