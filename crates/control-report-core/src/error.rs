use thiserror::Error;

/// Unified error type for control-report-core
///
/// Only failures that leave no document to hand back are represented here:
/// - Composition (geometry, layout, serialization)
/// - Malformed case records
/// - Collaborator lookups (case provider, attachment store)
/// - Configuration and I/O
///
/// Attachment problems are never errors at the public API; they surface as
/// [`crate::pdf::merge::SkipReason`] values inside a merge summary.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Composition Errors
    // ==========================================================================
    /// Page size, margins or column fractions do not describe a usable frame
    #[error("invalid page geometry: {0}")]
    InvalidGeometry(String),

    /// A block can never fit on an empty page
    #[error("{what} needs {needed:.1}pt but a page only has {available:.1}pt")]
    LayoutOverflow {
        what: String,
        needed: f32,
        available: f32,
    },

    /// Failed to serialize the composed document
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Record Errors
    // ==========================================================================
    /// The case record could not be decoded (e.g. missing identifier)
    #[error("malformed case record: {0}")]
    MalformedRecord(String),

    // ==========================================================================
    // Asset Errors
    // ==========================================================================
    /// The logo asset exists but could not be decoded
    #[error("failed to decode asset {path}: {reason}")]
    AssetDecode { path: String, reason: String },

    // ==========================================================================
    // Merge Errors
    // ==========================================================================
    /// The merge step failed as a whole (recovered by falling back)
    #[error("failed to merge attachments: {0}")]
    Merge(String),

    // ==========================================================================
    // Collaborator Errors
    // ==========================================================================
    /// No case record exists for the identifier
    #[error("case {0} not found")]
    CaseNotFound(u32),

    /// A collaborator (case provider, attachment store) failed
    #[error("{source_name} failed: {reason}")]
    Provider {
        source_name: &'static str,
        reason: String,
    },

    /// The blocking generation task did not complete
    #[error("report generation task failed: {0}")]
    Task(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
