//! Category normalization from the listings service
//!
//! Feeds use free-form genre labels; downstream consumers want the canonical
//! vocabulary. The listings service publishes a lowercased-label to
//! canonical-genre map, fetched once at construction.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::document::Element;
use crate::errors::StageError;
use crate::pipeline::{Stage, StageStatus};
use crate::stages::client::ServiceClient;
use crate::utils::sanitize_base_url;

pub struct CategoryMapStage {
    genres: HashMap<String, String>,
    status: StageStatus,
}

impl CategoryMapStage {
    pub fn new(client: &ServiceClient, base_url: &str) -> Self {
        let url = format!("{}/categories.json", sanitize_base_url(base_url));
        match client.get_json::<HashMap<String, String>>(&url) {
            Ok(genres) => {
                info!("loaded {} category mappings", genres.len());
                Self {
                    genres: genres
                        .into_iter()
                        .map(|(label, genre)| (label.to_lowercase(), genre))
                        .collect(),
                    status: StageStatus::Ready,
                }
            }
            Err(err) => Self::unavailable(format!("category service: {}", err)),
        }
    }

    /// Build a stage from an already-loaded genre table
    pub fn from_table(genres: HashMap<String, String>) -> Self {
        Self {
            genres: genres
                .into_iter()
                .map(|(label, genre)| (label.to_lowercase(), genre))
                .collect(),
            status: StageStatus::Ready,
        }
    }

    /// Build a permanently invalid stage; every per-entry call is a no-op
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        let reason = reason.into();
        warn!("category-map stage disabled: {}", reason);
        Self {
            genres: HashMap::new(),
            status: StageStatus::invalid(reason),
        }
    }
}

impl Stage for CategoryMapStage {
    fn name(&self) -> &'static str {
        "category-map"
    }

    fn apply_to_entry(&mut self, entry: &mut Element) -> Result<(), StageError> {
        if !self.status.is_ready() {
            return Ok(());
        }

        for category in entry.children_named_mut("category") {
            let mapped = category
                .text()
                .and_then(|label| self.genres.get(&label.to_lowercase()))
                .cloned();
            if let Some(mapped) = mapped {
                category.set_text(mapped);
            }
        }
        Ok(())
    }
}
