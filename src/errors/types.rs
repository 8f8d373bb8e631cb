//! Error type definitions for the xmltv-augment application
//!
//! Stage-level errors never escape the pipeline engine; document errors and
//! update errors surface at the driver, which maps them to exit codes.

use thiserror::Error;

/// Errors raised by a stage while transforming a single entry or finalizing
/// the document.
///
/// A `NotImplemented` from `Stage::finalize` is the "this stage has no batch
/// step" signal and is swallowed silently by the engine. Every other variant
/// is logged with the stage's identity and isolated to the entry (or the
/// finalize call) that produced it.
#[derive(Error, Debug)]
pub enum StageError {
    /// Returned by the default `Stage::finalize` implementation.
    #[error("finalize not implemented")]
    NotImplemented,

    /// A single entry could not be processed (malformed attributes, missing
    /// structure the stage requires).
    #[error("malformed entry: {message}")]
    Entry { message: String },

    /// A remote lookup failed for this entry.
    #[error("{service} lookup failed: {message}")]
    Service { service: String, message: String },
}

impl StageError {
    /// Create an entry-level error with a custom message
    pub fn entry<S: Into<String>>(message: S) -> Self {
        Self::Entry {
            message: message.into(),
        }
    }

    /// Create a service-level error for a named external service
    pub fn service<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::Service {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// Errors from parsing, canonicalizing, or serializing the listings document
#[derive(Error, Debug)]
pub enum DocumentError {
    /// XML syntax errors from the underlying reader/writer
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// I/O failures while writing serialized output
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The document does not have the shape of a listings document
    #[error("malformed document: {message}")]
    Structure { message: String },

    /// An entry carries a child element outside the canonical tag set.
    /// Upstream stages must only emit known tags, so this is a contract
    /// violation and fatal to the run.
    #[error("unknown child element <{tag}> under <programme>")]
    UnknownTag { tag: String },
}

impl DocumentError {
    /// Create a structure error with a custom message
    pub fn structure<S: Into<String>>(message: S) -> Self {
        Self::Structure {
            message: message.into(),
        }
    }
}

/// Errors from fetching JSON payloads from a listings service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Connection-level failures
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Response body did not match the expected payload shape
    #[error("invalid payload from {url}: {message}")]
    Payload { url: String, message: String },
}

impl ServiceError {
    /// True when the failure is a plain HTTP 404, i.e. the service answered
    /// but has no record rather than being broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Errors from the version update check, each mapped to a driver exit code
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The update service could not be reached (exit code 3)
    #[error("update service unreachable: {message}")]
    Unreachable { message: String },

    /// The update service answered with something unparsable (exit code 4)
    #[error("update response unparsable: {message}")]
    Unparsable { message: String },

    /// The running version is below the mandatory minimum (exit code 5)
    #[error("version {current} is below the mandatory minimum {minimum}")]
    UpgradeRequired { current: String, minimum: String },
}

/// Raised by the driver when standard input is a terminal and no listings
/// file was named (exit code 2)
#[derive(Error, Debug)]
#[error("no input: name a listings file or pipe a document to standard input")]
pub struct NoInputError;
