use markers::GestureMode;
use thiserror::Error;

use crate::orchestrator::ReviewState;
use crate::validation::ValidationError;

/// Synchronous rejection of a user action. The review state is unchanged.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    InvalidFile(#[from] ValidationError),

    #[error("set a location on the map before uploading")]
    LocationRequired,

    #[error("finish dragging the marker before uploading ({mode:?})")]
    GestureInProgress { mode: GestureMode },

    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: ReviewState,
    },

    #[error("failed to encode photo metadata: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Why the persistence collaborator did not return a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("upload failed: {0}")]
    Transport(String),

    #[error("upload timed out after {after_ms} ms")]
    TimedOut { after_ms: u64 },
}

/// Metadata extraction failed; the review continues without metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("metadata extraction failed: {0}")]
pub struct ExtractionError(pub String);
