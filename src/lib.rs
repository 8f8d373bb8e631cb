//! xmltv-augment: batch post-processor for XMLTV listings documents.
//!
//! A listings document is parsed into an in-memory tree, run through an
//! ordered list of enrichment and correction stages (each isolated from the
//! failures of the others), canonicalized into a deterministic child order,
//! and re-serialized with regenerated indentation.

pub mod config;
pub mod document;
pub mod errors;
pub mod pipeline;
pub mod stages;
pub mod update;
pub mod utils;
