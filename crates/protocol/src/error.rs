//! Transport-agnostic API error.

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the transport seams.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Errors returned by any collaborator call.
///
/// Implementations of the transport seams map their native errors into this
/// type so that upload and stream logic never depend on a particular HTTP
/// client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Returns the HTTP status code when the server answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
