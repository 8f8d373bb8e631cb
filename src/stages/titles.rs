//! Title corrections from the listings service
//!
//! Broadcasters misname programmes in ways that break downstream matching
//! ("Coro St" for "Coronation Street"). The listings service publishes a
//! curated map of exact titles to replacements, fetched once at
//! construction.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::document::Element;
use crate::errors::StageError;
use crate::pipeline::{Stage, StageStatus};
use crate::stages::client::ServiceClient;
use crate::utils::sanitize_base_url;

pub struct TitleFixStage {
    replacements: HashMap<String, String>,
    status: StageStatus,
}

impl TitleFixStage {
    pub fn new(client: &ServiceClient, base_url: &str) -> Self {
        let url = format!("{}/titles.json", sanitize_base_url(base_url));
        match client.get_json::<HashMap<String, String>>(&url) {
            Ok(replacements) => {
                info!("loaded {} title replacements", replacements.len());
                Self {
                    replacements,
                    status: StageStatus::Ready,
                }
            }
            Err(err) => Self::unavailable(format!("title service: {}", err)),
        }
    }

    /// Build a stage from an already-loaded replacement table
    pub fn from_table(replacements: HashMap<String, String>) -> Self {
        Self {
            replacements,
            status: StageStatus::Ready,
        }
    }

    /// Build a permanently invalid stage; every per-entry call is a no-op
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        let reason = reason.into();
        warn!("title-fix stage disabled: {}", reason);
        Self {
            replacements: HashMap::new(),
            status: StageStatus::invalid(reason),
        }
    }
}

impl Stage for TitleFixStage {
    fn name(&self) -> &'static str {
        "title-fix"
    }

    fn apply_to_entry(&mut self, entry: &mut Element) -> Result<(), StageError> {
        if !self.status.is_ready() {
            return Ok(());
        }

        let replacement = entry
            .child_text("title")
            .and_then(|title| self.replacements.get(title))
            .cloned();
        let Some(replacement) = replacement else {
            return Ok(());
        };

        if let Some(title_el) = entry.child_mut("title") {
            debug!("rewriting title to '{}'", replacement);
            title_el.set_text(replacement);
        }
        Ok(())
    }
}
