//! Concrete processing stages and the fixed stage list
//!
//! Every stage is an independent implementation of the
//! [`Stage`](crate::pipeline::Stage) contract; the engine never sees a
//! concrete type. Stages that depend on an external service fetch their data
//! at construction and degrade to a permanent no-op when the fetch fails.

pub mod categories;
pub mod client;
pub mod episodes;
pub mod movies;
pub mod overrides;
pub mod series;
pub mod subtitles;
pub mod titles;
pub mod video;

use tracing::warn;

use crate::config::Config;
use crate::pipeline::Stage;

pub use categories::CategoryMapStage;
pub use client::ServiceClient;
pub use episodes::EpisodeNumberStage;
pub use movies::MovieLookupStage;
pub use overrides::{OverrideAction, OverrideRecord, OverridesStage};
pub use series::SeriesLookupStage;
pub use subtitles::SubtitleExtractStage;
pub use titles::TitleFixStage;
pub use video::VideoQualityStage;

/// Construct the full stage list in its fixed order.
///
/// Title correction runs first so every later stage matches on corrected
/// titles; the hand-curated overrides run before the heuristic extraction
/// stages; the remote lookups run last, keyed on fully corrected titles and
/// subtitles.
pub fn build(config: &Config) -> Vec<Box<dyn Stage>> {
    let client = ServiceClient::new(&config.http);
    let timezone = match config.timezone() {
        Ok(timezone) => timezone,
        Err(err) => {
            warn!("{}; falling back to UTC", err);
            chrono_tz::UTC
        }
    };
    let base_url = &config.services.base_url;

    vec![
        Box::new(TitleFixStage::new(&client, base_url)),
        Box::new(OverridesStage::new(&client, base_url, timezone)),
        Box::new(SubtitleExtractStage::new()),
        Box::new(VideoQualityStage::new()),
        Box::new(EpisodeNumberStage::new()),
        Box::new(CategoryMapStage::new(&client, base_url)),
        Box::new(SeriesLookupStage::new(
            client.clone(),
            config.services.series_url.as_deref(),
        )),
        Box::new(MovieLookupStage::new(
            client,
            config.services.movies_url.as_deref(),
        )),
    ]
}
