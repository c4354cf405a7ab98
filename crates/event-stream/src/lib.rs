//! Resumable, deduplicated consumption of the session event feed.
//!
//! [`EventStreamConsumer`] keeps one live connection per session, reconnects
//! with backoff after transport drops, resumes from the last seen event id,
//! and hands every distinct record to the caller exactly once. Only an
//! explicit `status|done` / `status|error` record ends the stream.

mod consumer;
pub mod cursor;
pub mod source;
pub mod sse;
pub mod types;

use reportflow_protocol::ApiError;

pub use consumer::{EventHandler, EventStreamConsumer};
pub use cursor::{Admission, EventCursor};
pub use source::{EventFeed, EventSource};
pub use sse::SseDecoder;
pub use types::{ConsumerConfig, ReconnectConfig, StreamState, TerminalReason};

/// Errors on the event feed. All of them are transient: the consumer logs
/// them and reconnects.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("malformed event stream: {0}")]
    Protocol(String),
}
