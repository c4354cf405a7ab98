//! Workflow error types.

use reportflow_protocol::ApiError;
use reportflow_transfer::UploadError;

/// Errors surfaced to the user. None of them is retried automatically
/// except where noted; the user re-invokes the action.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("no active session")]
    NoSession,

    #[error("no files selected")]
    NoFiles,

    #[error("could not create session: {0}")]
    SessionCreation(#[source] ApiError),

    /// Raised after the configured retries are exhausted.
    #[error("upload of {file} failed: {source}")]
    Upload {
        file: String,
        #[source]
        source: UploadError,
    },

    #[error("processing already in progress")]
    ProcessingInProgress,

    #[error("processing already finished for this session")]
    AlreadyProcessed,

    #[error("processing was not started")]
    NotProcessing,

    #[error("could not start processing: {0}")]
    ProcessTrigger(#[source] ApiError),

    #[error("processing failed: {0}")]
    Terminal(String),

    #[error("processing stream cancelled")]
    Cancelled,

    #[error("index name for {0} is empty")]
    InvalidIndex(&'static str),

    #[error("ingest failed: {0}")]
    Ingest(#[source] ApiError),

    #[error("results not available yet")]
    DownloadUnavailable,

    #[error("download failed: {0}")]
    Download(#[source] ApiError),
}
