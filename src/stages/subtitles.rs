//! Episode subtitle extraction from combined titles
//!
//! Many feeds flatten `Title: Episode Name` or `Title - Episode Name` into
//! the title element. This stage splits the two apart when the entry has no
//! `<sub-title>` of its own.

use regex::Regex;

use crate::document::Element;
use crate::errors::StageError;
use crate::pipeline::Stage;

pub struct SubtitleExtractStage {
    colon_form: Regex,
    dash_form: Regex,
}

impl SubtitleExtractStage {
    pub fn new() -> Self {
        Self {
            colon_form: Regex::new(r"^(?P<title>[^:]+?):\s+(?P<sub>\S.*)$").unwrap(),
            dash_form: Regex::new(r"^(?P<title>.+?)\s+-\s+(?P<sub>\S.*)$").unwrap(),
        }
    }

    fn split(&self, title: &str) -> Option<(String, String)> {
        let captures = self
            .colon_form
            .captures(title)
            .or_else(|| self.dash_form.captures(title))?;
        Some((captures["title"].to_string(), captures["sub"].to_string()))
    }
}

impl Default for SubtitleExtractStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for SubtitleExtractStage {
    fn name(&self) -> &'static str {
        "subtitle-extract"
    }

    fn apply_to_entry(&mut self, entry: &mut Element) -> Result<(), StageError> {
        if entry.has_child("sub-title") {
            return Ok(());
        }

        let split = entry.child_text("title").and_then(|title| self.split(title));
        let Some((title, subtitle)) = split else {
            return Ok(());
        };

        let lang = entry
            .child("title")
            .and_then(|el| el.attr("lang"))
            .map(str::to_string);

        if let Some(title_el) = entry.child_mut("title") {
            title_el.set_text(title);
        }

        let mut sub_el = Element::new("sub-title");
        if let Some(lang) = lang {
            sub_el.set_attr("lang", lang);
        }
        sub_el.set_text(subtitle);
        entry.append_child(sub_el);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_title(title: &str) -> Element {
        let mut entry = Element::new("programme");
        entry.set_attr("channel", "tv1");
        let mut title_el = Element::new("title");
        title_el.set_attr("lang", "en");
        title_el.set_text(title);
        entry.append_child(title_el);
        entry
    }

    #[test]
    fn test_splits_colon_form() {
        let mut entry = entry_with_title("Country Calendar: High Country Spring");
        SubtitleExtractStage::new().apply_to_entry(&mut entry).unwrap();
        assert_eq!(entry.child_text("title"), Some("Country Calendar"));
        assert_eq!(entry.child_text("sub-title"), Some("High Country Spring"));
    }

    #[test]
    fn test_splits_dash_form() {
        let mut entry = entry_with_title("Horizon - The Secret Life of Caves");
        SubtitleExtractStage::new().apply_to_entry(&mut entry).unwrap();
        assert_eq!(entry.child_text("title"), Some("Horizon"));
        assert_eq!(entry.child_text("sub-title"), Some("The Secret Life of Caves"));
    }

    #[test]
    fn test_copies_language_attribute() {
        let mut entry = entry_with_title("Show: Episode");
        SubtitleExtractStage::new().apply_to_entry(&mut entry).unwrap();
        assert_eq!(entry.child("sub-title").unwrap().attr("lang"), Some("en"));
    }

    #[test]
    fn test_existing_subtitle_wins() {
        let mut entry = entry_with_title("Show: Episode");
        entry.set_child_text("sub-title", "Already Here");
        SubtitleExtractStage::new().apply_to_entry(&mut entry).unwrap();
        assert_eq!(entry.child_text("title"), Some("Show: Episode"));
        assert_eq!(entry.child_text("sub-title"), Some("Already Here"));
    }

    #[test]
    fn test_plain_title_is_untouched() {
        let mut entry = entry_with_title("One News");
        SubtitleExtractStage::new().apply_to_entry(&mut entry).unwrap();
        assert_eq!(entry.child_text("title"), Some("One News"));
        assert!(!entry.has_child("sub-title"));
    }

    #[test]
    fn test_hyphenated_words_are_not_split() {
        let mut entry = entry_with_title("Spider-Man");
        SubtitleExtractStage::new().apply_to_entry(&mut entry).unwrap();
        assert_eq!(entry.child_text("title"), Some("Spider-Man"));
        assert!(!entry.has_child("sub-title"));
    }
}
