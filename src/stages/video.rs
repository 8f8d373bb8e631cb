//! High-definition marker detection
//!
//! Feeds flag HD broadcasts with ad-hoc markers in the title ("News (HD)",
//! "Movie HD"). This stage strips the marker from the title and subtitle and
//! records the fact in the structured `<video><quality>` block instead.

use regex::Regex;

use crate::document::Element;
use crate::errors::StageError;
use crate::pipeline::Stage;

pub struct VideoQualityStage {
    marker: Regex,
}

impl VideoQualityStage {
    pub fn new() -> Self {
        Self {
            marker: Regex::new(r"(?i)\s*(?:\((?:HD|HDTV)\)|\bHDTV\b|\bHD\b)\s*$").unwrap(),
        }
    }
}

impl Default for VideoQualityStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for VideoQualityStage {
    fn name(&self) -> &'static str {
        "video-quality"
    }

    fn apply_to_entry(&mut self, entry: &mut Element) -> Result<(), StageError> {
        let mut marked = false;
        for tag in ["title", "sub-title"] {
            let stripped = entry.child_text(tag).and_then(|text| {
                self.marker
                    .is_match(text)
                    .then(|| self.marker.replace(text, "").into_owned())
            });
            let Some(stripped) = stripped else {
                continue;
            };
            if stripped.is_empty() {
                // The whole text was the marker; leave it rather than emit an
                // empty element.
                continue;
            }
            if let Some(el) = entry.child_mut(tag) {
                el.set_text(stripped);
            }
            marked = true;
        }

        if marked {
            entry
                .ensure_child("video")
                .set_child_text("quality", "HDTV");
        }
        Ok(())
    }
}
