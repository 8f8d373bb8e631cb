//! Hand-curated listings overrides
//!
//! The override service publishes corrections keyed by channel and start
//! time: replace children on an entry, drop an entry entirely, or insert an
//! entry the feed is missing. Replacements happen during the per-entry pass;
//! removals observed during the pass and all insertions are queued and
//! applied in `finalize`, after the pass is complete.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::document::{Document, Element};
use crate::errors::StageError;
use crate::pipeline::canonical::CHILD_ORDER;
use crate::pipeline::{Stage, StageStatus};
use crate::stages::client::ServiceClient;
use crate::utils::sanitize_base_url;
use crate::utils::time::parse_xmltv_datetime;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideAction {
    Replace,
    Remove,
    Insert,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverrideRecord {
    pub channel: String,
    pub start: String,
    pub action: OverrideAction,
    #[serde(default)]
    pub stop: Option<String>,
    /// Child tag name to text content; an empty value removes the child
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

pub struct OverridesStage {
    records: Vec<OverrideRecord>,
    pending_removals: Vec<(String, DateTime<FixedOffset>)>,
    timezone: Tz,
    status: StageStatus,
}

impl OverridesStage {
    pub fn new(client: &ServiceClient, base_url: &str, timezone: Tz) -> Self {
        let url = format!("{}/overrides.json", sanitize_base_url(base_url));
        match client.get_json::<Vec<OverrideRecord>>(&url) {
            Ok(records) => {
                info!("loaded {} listing overrides", records.len());
                Self {
                    records,
                    pending_removals: Vec::new(),
                    timezone,
                    status: StageStatus::Ready,
                }
            }
            Err(err) => Self::unavailable(format!("override service: {}", err)),
        }
    }

    /// Build a stage from already-loaded override records
    pub fn from_records(records: Vec<OverrideRecord>, timezone: Tz) -> Self {
        Self {
            records,
            pending_removals: Vec::new(),
            timezone,
            status: StageStatus::Ready,
        }
    }

    /// Build a permanently invalid stage; every per-entry call is a no-op
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        let reason = reason.into();
        warn!("overrides stage disabled: {}", reason);
        Self {
            records: Vec::new(),
            pending_removals: Vec::new(),
            timezone: chrono_tz::UTC,
            status: StageStatus::invalid(reason),
        }
    }

    fn apply_fields(entry: &mut Element, fields: &HashMap<String, String>) {
        for (tag, value) in fields {
            if !CHILD_ORDER.contains(&tag.as_str()) {
                warn!("override names unknown child <{}>, skipping field", tag);
                continue;
            }
            if value.is_empty() {
                entry.remove_children(tag);
            } else {
                entry.set_child_text(tag, value.clone());
            }
        }
    }

    fn matching_entry(
        &self,
        record: &OverrideRecord,
        channel: &str,
        start: DateTime<FixedOffset>,
    ) -> bool {
        record.channel == channel
            && parse_xmltv_datetime(&record.start, &self.timezone)
                .map(|record_start| record_start == start)
                .unwrap_or(false)
    }

    fn build_entry(&self, record: &OverrideRecord) -> Element {
        let mut entry = Element::new("programme");
        entry.set_attr("start", record.start.clone());
        if let Some(stop) = &record.stop {
            entry.set_attr("stop", stop.clone());
        }
        entry.set_attr("channel", record.channel.clone());
        Self::apply_fields(&mut entry, &record.fields);
        entry
    }
}

impl Stage for OverridesStage {
    fn name(&self) -> &'static str {
        "overrides"
    }

    fn apply_to_entry(&mut self, entry: &mut Element) -> Result<(), StageError> {
        if !self.status.is_ready() {
            return Ok(());
        }

        let channel = entry
            .attr("channel")
            .ok_or_else(|| StageError::entry("missing channel attribute"))?
            .to_string();
        let start = entry
            .attr("start")
            .ok_or_else(|| StageError::entry("missing start attribute"))
            .and_then(|value| {
                parse_xmltv_datetime(value, &self.timezone).map_err(StageError::entry)
            })?;

        let mut removal = None;
        let mut replacements: Vec<&HashMap<String, String>> = Vec::new();
        for record in &self.records {
            if !self.matching_entry(record, &channel, start) {
                continue;
            }
            match record.action {
                OverrideAction::Replace => replacements.push(&record.fields),
                OverrideAction::Remove => removal = Some((channel.clone(), start)),
                OverrideAction::Insert => {}
            }
        }

        for fields in replacements {
            debug!("applying override to {}/{}", channel, start);
            Self::apply_fields(entry, fields);
        }
        if let Some(removal) = removal {
            self.pending_removals.push(removal);
        }
        Ok(())
    }

    fn finalize(&mut self, document: &mut Document) -> Result<(), StageError> {
        if !self.status.is_ready() {
            return Ok(());
        }

        let timezone = self.timezone;
        for (channel, start) in self.pending_removals.drain(..) {
            let removed = document.remove_entries_where(|entry| {
                entry.attr("channel") == Some(channel.as_str())
                    && entry
                        .attr("start")
                        .and_then(|value| parse_xmltv_datetime(value, &timezone).ok())
                        == Some(start)
            });
            info!("override removed {} entries for {}/{}", removed, channel, start);
        }

        for record in &self.records {
            if record.action != OverrideAction::Insert {
                continue;
            }
            let Ok(start) = parse_xmltv_datetime(&record.start, &self.timezone) else {
                warn!("override insert for '{}' has unparsable start", record.channel);
                continue;
            };
            let exists = document.entries().any(|entry| {
                entry.attr("channel") == Some(record.channel.as_str())
                    && entry
                        .attr("start")
                        .and_then(|value| parse_xmltv_datetime(value, &timezone).ok())
                        == Some(start)
            });
            if exists {
                debug!(
                    "override insert for {}/{} already present, skipping",
                    record.channel, record.start
                );
                continue;
            }
            info!("inserting override entry for {}/{}", record.channel, record.start);
            document.insert_entry(self.build_entry(record), &timezone);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    const DOC: &str = r#"<tv>
        <programme start="20240101180000 +1300" stop="20240101190000 +1300" channel="tv1">
            <title>One News</title>
        </programme>
        <programme start="20240101190000 +1300" stop="20240101200000 +1300" channel="tv1">
            <title>Infomercial</title>
        </programme>
    </tv>"#;

    fn run_stage(stage: &mut OverridesStage, document: &mut Document) {
        for entry in document.entries_mut() {
            stage.apply_to_entry(entry).unwrap();
        }
        stage.finalize(document).unwrap();
    }

    #[test]
    fn test_replace_sets_and_removes_children() {
        let mut document = Document::parse(DOC).unwrap();
        let mut stage = OverridesStage::from_records(
            vec![OverrideRecord {
                channel: "tv1".to_string(),
                start: "20240101180000 +1300".to_string(),
                action: OverrideAction::Replace,
                stop: None,
                fields: HashMap::from([
                    ("title".to_string(), "One News Special".to_string()),
                    ("desc".to_string(), "Extended bulletin.".to_string()),
                ]),
            }],
            chrono_tz::Pacific::Auckland,
        );

        run_stage(&mut stage, &mut document);

        let entry = document.entries().next().unwrap();
        assert_eq!(entry.child_text("title"), Some("One News Special"));
        assert_eq!(entry.child_text("desc"), Some("Extended bulletin."));
    }

    #[test]
    fn test_remove_is_applied_in_finalize() {
        let mut document = Document::parse(DOC).unwrap();
        let mut stage = OverridesStage::from_records(
            vec![OverrideRecord {
                channel: "tv1".to_string(),
                start: "20240101190000 +1300".to_string(),
                action: OverrideAction::Remove,
                stop: None,
                fields: HashMap::new(),
            }],
            chrono_tz::Pacific::Auckland,
        );

        for entry in document.entries_mut() {
            stage.apply_to_entry(entry).unwrap();
        }
        // Still present until finalize applies the queued removal
        assert_eq!(document.entry_count(), 2);

        stage.finalize(&mut document).unwrap();
        assert_eq!(document.entry_count(), 1);
        assert_eq!(
            document.entries().next().unwrap().child_text("title"),
            Some("One News")
        );
    }

    #[test]
    fn test_insert_creates_missing_entry_in_schedule_order() {
        let mut document = Document::parse(DOC).unwrap();
        let mut stage = OverridesStage::from_records(
            vec![OverrideRecord {
                channel: "tv1".to_string(),
                start: "20240101183000 +1300".to_string(),
                action: OverrideAction::Insert,
                stop: Some("20240101190000 +1300".to_string()),
                fields: HashMap::from([("title".to_string(), "Weather".to_string())]),
            }],
            chrono_tz::Pacific::Auckland,
        );

        run_stage(&mut stage, &mut document);

        let titles: Vec<_> = document
            .entries()
            .filter_map(|entry| entry.child_text("title"))
            .collect();
        assert_eq!(titles, vec!["One News", "Weather", "Infomercial"]);
    }

    #[test]
    fn test_insert_skipped_when_entry_exists() {
        let mut document = Document::parse(DOC).unwrap();
        let mut stage = OverridesStage::from_records(
            vec![OverrideRecord {
                channel: "tv1".to_string(),
                // Same instant as the first entry, expressed in UTC
                start: "20240101050000 +0000".to_string(),
                action: OverrideAction::Insert,
                stop: None,
                fields: HashMap::from([("title".to_string(), "Duplicate".to_string())]),
            }],
            chrono_tz::Pacific::Auckland,
        );

        run_stage(&mut stage, &mut document);
        assert_eq!(document.entry_count(), 2);
    }

    #[test]
    fn test_unknown_field_tags_are_ignored() {
        let mut document = Document::parse(DOC).unwrap();
        let mut stage = OverridesStage::from_records(
            vec![OverrideRecord {
                channel: "tv1".to_string(),
                start: "20240101180000 +1300".to_string(),
                action: OverrideAction::Replace,
                stop: None,
                fields: HashMap::from([("bogus-tag".to_string(), "value".to_string())]),
            }],
            chrono_tz::Pacific::Auckland,
        );

        run_stage(&mut stage, &mut document);
        assert!(!document.entries().next().unwrap().has_child("bogus-tag"));
    }

    #[test]
    fn test_unparsable_start_is_an_entry_error() {
        let mut document = Document::parse(
            r#"<tv><programme start="whenever" channel="tv1"><title>X</title></programme></tv>"#,
        )
        .unwrap();
        let mut stage =
            OverridesStage::from_records(Vec::new(), chrono_tz::Pacific::Auckland);
        let entry = document.entries_mut().next().unwrap();
        assert!(stage.apply_to_entry(entry).is_err());
    }

    #[test]
    fn test_invalid_stage_is_a_noop() {
        let mut document = Document::parse(DOC).unwrap();
        let before = document.clone();
        let mut stage = OverridesStage::unavailable("service unreachable");
        run_stage(&mut stage, &mut document);
        assert_eq!(document, before);
    }
}
