//! Sequential pipeline execution with per-entry fault isolation

use tracing::{debug, error, warn};

use crate::document::{Document, Element};
use crate::errors::StageError;
use crate::pipeline::stage::Stage;

/// Runs an ordered list of stages over a listings document.
///
/// Stages run strictly in order; within a stage, entries are processed
/// strictly in document order. A failure on one entry is logged with the
/// stage's identity and never aborts the stage or the run; a failure in a
/// stage's finalize step is logged and swallowed. The engine itself has no
/// domain-error path — an empty stage list is a valid no-op run.
pub struct Engine {
    stages: Vec<Box<dyn Stage>>,
}

impl Engine {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run every stage over the document.
    ///
    /// Each stage's finalize runs immediately after its own per-entry pass,
    /// so later stages observe any entries it inserted or removed and take
    /// their own snapshot of the updated entry list.
    pub fn run(&mut self, document: &mut Document) {
        for stage in &mut self.stages {
            debug!(
                "running stage '{}' over {} entries",
                stage.name(),
                document.entry_count()
            );

            let mut failures = 0usize;
            // The entry list cannot change during this pass: stages only hold
            // the entry itself, and document-level mutation is deferred to
            // finalize. Iterating the live list is therefore the snapshot.
            for entry in document.entries_mut() {
                let label = entry_label(entry);
                if let Err(err) = stage.apply_to_entry(entry) {
                    failures += 1;
                    error!("stage '{}' failed on entry {}: {}", stage.name(), label, err);
                }
            }

            match stage.finalize(document) {
                Ok(()) => debug!("stage '{}' finalized", stage.name()),
                Err(StageError::NotImplemented) => {}
                Err(err) => warn!("stage '{}' finalize failed: {}", stage.name(), err),
            }

            if failures > 0 {
                warn!(
                    "stage '{}' completed with {} failed entries",
                    stage.name(),
                    failures
                );
            }
        }
    }
}

fn entry_label(entry: &Element) -> String {
    format!(
        "{}/{}",
        entry.attr("channel").unwrap_or("?"),
        entry.attr("start").unwrap_or("?")
    )
}
