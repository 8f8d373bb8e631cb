//! Movie metadata lookups
//!
//! Entries categorized as films are enriched from the movie metadata
//! service: release year and an aggregate star rating. The service is an
//! optional dependency; when no URL is configured the stage degrades to
//! invalid and the run carries on without it.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::document::Element;
use crate::errors::StageError;
use crate::pipeline::{Stage, StageStatus};
use crate::stages::client::ServiceClient;
use crate::utils::sanitize_base_url;

#[derive(Debug, Clone, Deserialize)]
pub struct MovieRecord {
    pub year: Option<u32>,
    /// Aggregate rating out of ten
    pub rating: Option<f32>,
}

pub struct MovieLookupStage {
    client: Option<ServiceClient>,
    base_url: String,
    cache: HashMap<String, Option<MovieRecord>>,
    status: StageStatus,
}

impl MovieLookupStage {
    pub fn new(client: ServiceClient, base_url: Option<&str>) -> Self {
        match base_url {
            Some(base_url) => Self {
                client: Some(client),
                base_url: sanitize_base_url(base_url),
                cache: HashMap::new(),
                status: StageStatus::Ready,
            },
            None => Self::unavailable("movie service not configured"),
        }
    }

    /// Build a permanently invalid stage; every per-entry call is a no-op
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        let reason = reason.into();
        warn!("movie-lookup stage disabled: {}", reason);
        Self {
            client: None,
            base_url: String::new(),
            cache: HashMap::new(),
            status: StageStatus::invalid(reason),
        }
    }

    fn is_film(entry: &Element) -> bool {
        entry
            .children_named("category")
            .filter_map(Element::text)
            .any(|label| {
                let label = label.to_lowercase();
                label == "movie" || label == "film"
            })
    }

    fn record_for(&mut self, title: &str) -> Result<Option<&MovieRecord>, StageError> {
        if !self.cache.contains_key(title) {
            let Some(client) = &self.client else {
                return Ok(None);
            };
            let url = format!(
                "{}/lookup?title={}",
                self.base_url,
                urlencoding::encode(title)
            );
            match client.get_json::<MovieRecord>(&url) {
                Ok(record) => {
                    self.cache.insert(title.to_string(), Some(record));
                }
                Err(err) if err.is_not_found() => {
                    debug!("no movie record for '{}'", title);
                    self.cache.insert(title.to_string(), None);
                }
                Err(err) => return Err(StageError::service("movie", err.to_string())),
            }
        }
        Ok(self.cache.get(title).and_then(Option::as_ref))
    }
}

impl Stage for MovieLookupStage {
    fn name(&self) -> &'static str {
        "movie-lookup"
    }

    fn apply_to_entry(&mut self, entry: &mut Element) -> Result<(), StageError> {
        if !self.status.is_ready() || !Self::is_film(entry) {
            return Ok(());
        }

        let Some(title) = entry.child_text("title").map(str::to_string) else {
            return Ok(());
        };

        let record = match self.record_for(&title)? {
            Some(record) => record.clone(),
            None => return Ok(()),
        };

        if !entry.has_child("date") {
            if let Some(year) = record.year {
                entry.set_child_text("date", year.to_string());
            }
        }

        if !entry.has_child("star-rating") {
            if let Some(rating) = record.rating {
                let mut star_rating = Element::new("star-rating");
                star_rating.set_child_text("value", format!("{:.1}/10", rating));
                entry.append_child(star_rating);
            }
        }

        Ok(())
    }
}
