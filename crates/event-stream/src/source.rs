//! Transport seam for the event feed.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use reportflow_protocol::EventRecord;

use crate::StreamError;

/// An open feed. Ends (`None`) when the server closes the connection.
pub type EventFeed = Pin<Box<dyn Stream<Item = Result<EventRecord, StreamError>> + Send>>;

/// Opens connections to `GET /sessions/{id}/events`.
///
/// The HTTP client implements this on top of a streaming response; tests
/// implement it with scripted feeds.
pub trait EventSource: Send + Sync {
    /// Connects to the session's feed, resuming strictly after `from` when
    /// given.
    fn connect(
        &self,
        session_id: String,
        from: Option<String>,
    ) -> Pin<Box<dyn Future<Output = Result<EventFeed, StreamError>> + Send + '_>>;
}
