//! On-screen episode number detection
//!
//! Picks episode numbering out of titles, subtitles and descriptions
//! (`S01E05`, `Ep 5`, `5/10`) and records it as `<episode-num>` elements:
//! the zero-based `xmltv_ns` form when enough is known, plus the matched
//! text under `system="onscreen"`.

use regex::Regex;

use crate::document::Element;
use crate::errors::StageError;
use crate::pipeline::Stage;

pub struct EpisodeNumberStage {
    season_episode: Regex,
    episode_word: Regex,
    episode_of_total: Regex,
}

#[derive(Debug, PartialEq)]
struct EpisodeNumber {
    onscreen: String,
    season: Option<u32>,
    episode: u32,
    total: Option<u32>,
}

impl EpisodeNumberStage {
    pub fn new() -> Self {
        Self {
            season_episode: Regex::new(r"\b[Ss](\d{1,2})[Ee](\d{1,3})\b").unwrap(),
            episode_word: Regex::new(r"(?i)\bep(?:isode)?\.?\s*(\d{1,4})\b").unwrap(),
            episode_of_total: Regex::new(r"\b(\d{1,3})\s*/\s*(\d{1,3})\b").unwrap(),
        }
    }

    fn detect(&self, text: &str) -> Option<EpisodeNumber> {
        if let Some(caps) = self.season_episode.captures(text) {
            return Some(EpisodeNumber {
                onscreen: caps[0].to_string(),
                season: caps[1].parse().ok(),
                episode: caps[2].parse().ok()?,
                total: None,
            });
        }
        if let Some(caps) = self.episode_word.captures(text) {
            return Some(EpisodeNumber {
                onscreen: caps[0].to_string(),
                season: None,
                episode: caps[1].parse().ok()?,
                total: None,
            });
        }
        if let Some(caps) = self.episode_of_total.captures(text) {
            let episode: u32 = caps[1].parse().ok()?;
            let total: u32 = caps[2].parse().ok()?;
            if episode >= 1 && episode <= total {
                return Some(EpisodeNumber {
                    onscreen: caps[0].to_string(),
                    season: None,
                    episode,
                    total: Some(total),
                });
            }
        }
        None
    }
}

impl EpisodeNumber {
    /// Zero-based `season . episode/total .` form; empty fields stay empty
    fn xmltv_ns(&self) -> Option<String> {
        if self.episode == 0 {
            return None;
        }
        let season = self
            .season
            .filter(|s| *s >= 1)
            .map(|s| (s - 1).to_string())
            .unwrap_or_default();
        let episode = match self.total {
            Some(total) => format!("{}/{}", self.episode - 1, total),
            None => (self.episode - 1).to_string(),
        };
        Some(format!("{}.{}.", season, episode))
    }
}

impl Default for EpisodeNumberStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for EpisodeNumberStage {
    fn name(&self) -> &'static str {
        "episode-number"
    }

    fn apply_to_entry(&mut self, entry: &mut Element) -> Result<(), StageError> {
        if entry.has_child("episode-num") {
            return Ok(());
        }

        let detected = ["sub-title", "title", "desc"]
            .iter()
            .filter_map(|tag| entry.child_text(tag))
            .find_map(|text| self.detect(text));
        let Some(detected) = detected else {
            return Ok(());
        };

        if let Some(ns) = detected.xmltv_ns() {
            let mut ns_el = Element::new("episode-num");
            ns_el.set_attr("system", "xmltv_ns");
            ns_el.set_text(ns);
            entry.append_child(ns_el);
        }

        let mut onscreen_el = Element::new("episode-num");
        onscreen_el.set_attr("system", "onscreen");
        onscreen_el.set_text(detected.onscreen);
        entry.append_child(onscreen_el);
        Ok(())
    }
}
