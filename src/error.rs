//! Error types for the briefing pack pipeline.

/// Errors raised while aggregating, narrating or assembling a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("Invalid subsection '{subsection}' for component '{component}'")]
    InvalidSubsection {
        component: String,
        subsection: String,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Narrative backend error: {0}")]
    NarrativeBackend(String),

    #[error("Invalid query parameters: {0}")]
    InvalidParameters(String),

    #[error("Narration '{kind}' cannot consume a {payload} payload")]
    PayloadMismatch { kind: String, payload: String },

    #[error("Component '{0}' was already merged into the report")]
    DuplicateComponent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Whether a caller may recover locally instead of aborting the run.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, ReportError::InsufficientData(_))
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
