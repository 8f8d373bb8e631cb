//! Episode-database lookups
//!
//! For series entries carrying an episode subtitle, the series service can
//! supply the original air date and season/episode numbering. Lookups are
//! keyed by title, fetched lazily during the per-entry pass and cached for
//! the rest of the run. A missing record is an expected condition; only
//! transport failures are surfaced as entry errors.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::document::Element;
use crate::errors::StageError;
use crate::pipeline::{Stage, StageStatus};
use crate::stages::client::ServiceClient;
use crate::utils::sanitize_base_url;

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesRecord {
    #[serde(default)]
    pub episodes: Vec<SeriesEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesEpisode {
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Original air date, `YYYY-MM-DD`
    pub aired: Option<String>,
}

pub struct SeriesLookupStage {
    client: Option<ServiceClient>,
    base_url: String,
    cache: HashMap<String, Option<SeriesRecord>>,
    status: StageStatus,
}

impl SeriesLookupStage {
    pub fn new(client: ServiceClient, base_url: Option<&str>) -> Self {
        match base_url {
            Some(base_url) => Self {
                client: Some(client),
                base_url: sanitize_base_url(base_url),
                cache: HashMap::new(),
                status: StageStatus::Ready,
            },
            None => Self::unavailable("series service not configured"),
        }
    }

    /// Build a permanently invalid stage; every per-entry call is a no-op
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        let reason = reason.into();
        warn!("series-lookup stage disabled: {}", reason);
        Self {
            client: None,
            base_url: String::new(),
            cache: HashMap::new(),
            status: StageStatus::invalid(reason),
        }
    }

    fn record_for(&mut self, title: &str) -> Result<Option<&SeriesRecord>, StageError> {
        if !self.cache.contains_key(title) {
            let Some(client) = &self.client else {
                return Ok(None);
            };
            let url = format!(
                "{}/{}.json",
                self.base_url,
                urlencoding::encode(title)
            );
            match client.get_json::<SeriesRecord>(&url) {
                Ok(record) => {
                    self.cache.insert(title.to_string(), Some(record));
                }
                Err(err) if err.is_not_found() => {
                    debug!("no series record for '{}'", title);
                    self.cache.insert(title.to_string(), None);
                }
                // Transient failures are not cached, so a later entry with
                // the same title gets another attempt.
                Err(err) => return Err(StageError::service("series", err.to_string())),
            }
        }
        Ok(self.cache.get(title).and_then(Option::as_ref))
    }

    fn find_episode<'a>(record: &'a SeriesRecord, subtitle: &str) -> Option<&'a SeriesEpisode> {
        let wanted = subtitle.to_lowercase();
        record
            .episodes
            .iter()
            .find(|episode| episode.title.to_lowercase() == wanted)
    }
}

impl Stage for SeriesLookupStage {
    fn name(&self) -> &'static str {
        "series-lookup"
    }

    fn apply_to_entry(&mut self, entry: &mut Element) -> Result<(), StageError> {
        if !self.status.is_ready() {
            return Ok(());
        }

        let (title, subtitle) = match (entry.child_text("title"), entry.child_text("sub-title")) {
            (Some(title), Some(subtitle)) => (title.to_string(), subtitle.to_string()),
            _ => return Ok(()),
        };

        let episode = match self.record_for(&title)? {
            Some(record) => match Self::find_episode(record, &subtitle) {
                Some(episode) => episode.clone(),
                None => return Ok(()),
            },
            None => return Ok(()),
        };

        if !entry.has_child("date") {
            if let Some(aired) = &episode.aired {
                entry.set_child_text("date", aired.replace('-', ""));
            }
        }

        if !entry.has_child("episode-num") {
            if let (Some(season), Some(number)) = (episode.season, episode.episode) {
                let mut onscreen = Element::new("episode-num");
                onscreen.set_attr("system", "onscreen");
                onscreen.set_text(format!("S{:02}E{:02}", season, number));
                entry.append_child(onscreen);
            }
        }

        Ok(())
    }
}
