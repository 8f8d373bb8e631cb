//! The contract every processing stage implements

use crate::document::{Document, Element};
use crate::errors::StageError;

/// One enrichment or correction concern, applied entry by entry with an
/// optional whole-document batch step.
///
/// Stages own whatever data they fetched at construction time; they never own
/// the document. Construction never fails: a stage whose external data source
/// is unreachable records a [`StageStatus::Invalid`] and turns every
/// `apply_to_entry` call into an observable no-op for the rest of the run.
///
/// Expected "no match" conditions are not errors — a stage signals "nothing
/// to do" by simply not mutating the entry.
pub trait Stage {
    /// Stable identity used in log records
    fn name(&self) -> &'static str;

    /// Transform a single entry in place.
    ///
    /// Called once per entry, in document order. Document-level mutation is
    /// not possible from here; stages that need to insert or remove entries
    /// queue the change and apply it in [`finalize`](Self::finalize), so a
    /// stage's own per-entry pass can never visit an entry it inserted.
    fn apply_to_entry(&mut self, entry: &mut Element) -> Result<(), StageError>;

    /// Whole-document batch step, invoked once after this stage's per-entry
    /// pass. The default signals "no batch step", which the engine swallows
    /// silently.
    fn finalize(&mut self, _document: &mut Document) -> Result<(), StageError> {
        Err(StageError::NotImplemented)
    }
}

/// Readiness of a stage that depends on construction-time external data
#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Ready,
    Invalid { reason: String },
}

impl StageStatus {
    pub fn invalid<S: Into<String>>(reason: S) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}
