//! Shared HTTP client for the listings services
//!
//! One configured blocking client is built per run and handed to every stage
//! constructor, so the user-agent and timeout are applied uniformly and no
//! stage reaches for process-wide state.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
}

impl ServiceClient {
    pub fn new(config: &HttpConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|err| {
                warn!("falling back to default HTTP client: {}", err);
                Client::new()
            });
        Self { client }
    }

    /// Fetch a JSON payload from a service URL
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ServiceError> {
        debug!("fetching {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response.json().map_err(|e| ServiceError::Payload {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
