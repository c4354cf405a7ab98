//! Chunked, resumable file upload.
//!
//! A file is transferred as a strictly ordered sequence of byte ranges. The
//! acknowledged offset only moves forward after the server confirms a range,
//! so any failed step can be retried by calling the same operation again.

mod chunked;
mod session;
mod types;
mod validation;

use reportflow_protocol::ApiError;

pub use chunked::ChunkReader;
pub use session::{UploadApi, UploadSession};
pub use types::{UploadProgress, UploadStatus, UploadTask};
pub use validation::{remote_file_name, validate_file_name};

/// Default chunk size: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = reportflow_protocol::constants::CHUNK_SIZE;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload allocation rejected for {filename}: {source}")]
    Allocation {
        filename: String,
        #[source]
        source: ApiError,
    },

    #[error("chunk transfer failed at offset {offset}: {source}")]
    ChunkTransfer {
        offset: u64,
        #[source]
        source: ApiError,
    },

    #[error("upload completion failed: {0}")]
    Completion(#[source] ApiError),

    #[error("upload incomplete: {offset} of {total_size} bytes acknowledged")]
    Incomplete { offset: u64, total_size: u64 },

    #[error("upload already finished: {0:?}")]
    Finished(UploadStatus),

    #[error("invalid file name: {0}")]
    InvalidName(String),
}

impl UploadError {
    /// Whether re-invoking the failed operation can succeed.
    ///
    /// Only server round-trips qualify; local I/O, naming and state errors
    /// fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Allocation { .. } | Self::ChunkTransfer { .. } | Self::Completion(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_failures_are_retryable() {
        let err = UploadError::ChunkTransfer {
            offset: 0,
            source: ApiError::Http("timed out".into()),
        };
        assert!(err.is_retryable());
        assert!(UploadError::Completion(ApiError::Rejected("no".into())).is_retryable());

        assert!(!UploadError::InvalidName("..".into()).is_retryable());
        assert!(
            !UploadError::Incomplete {
                offset: 1,
                total_size: 2
            }
            .is_retryable()
        );
        assert!(!UploadError::Finished(UploadStatus::Failed).is_retryable());
    }
}
