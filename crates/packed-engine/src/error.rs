use std::fmt;

use packed_contracts::design::ImageRefError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Synthesize,
    Edit,
    ExtractSpec,
    FetchTrendReport,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synthesize => "synthesize",
            Self::Edit => "edit",
            Self::ExtractSpec => "extract_spec",
            Self::FetchTrendReport => "fetch_trend_report",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single generation-service call. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("design generation failed: {0}")]
    GenerationFailed(String),
    #[error("design edit failed: {0}")]
    EditFailed(String),
    #[error("tech pack response could not be parsed: {0}")]
    SpecParseFailed(String),
    #[error("trend report fetch failed: {0}")]
    TrendFetchFailed(String),
    #[error("{operation} timed out after {seconds}s")]
    TimedOut { operation: Operation, seconds: u64 },
    #[error("invalid image reference: {0}")]
    InvalidImage(#[from] ImageRefError),
    #[error("GEMINI_API_KEY or GOOGLE_API_KEY not set")]
    MissingApiKey,
}

impl GenerationError {
    /// The failure kind an operation reports when the service misbehaves.
    pub fn failed(operation: Operation, message: impl Into<String>) -> Self {
        let message = message.into();
        match operation {
            Operation::Synthesize => Self::GenerationFailed(message),
            Operation::Edit => Self::EditFailed(message),
            Operation::ExtractSpec => Self::SpecParseFailed(message),
            Operation::FetchTrendReport => Self::TrendFetchFailed(message),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::GenerationFailed(_) => "GenerationFailed",
            Self::EditFailed(_) => "EditFailed",
            Self::SpecParseFailed(_) => "SpecParseFailed",
            Self::TrendFetchFailed(_) => "TrendFetchFailed",
            Self::TimedOut { .. } => "TimedOut",
            Self::InvalidImage(_) => "InvalidImage",
            Self::MissingApiKey => "MissingApiKey",
        }
    }
}
