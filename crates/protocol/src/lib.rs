//! Wire types for the report-processing session API.
//!
//! Request and response bodies, byte-range descriptors for chunked uploads,
//! and the `category|detail` progress records pushed over the event feed.

pub mod constants;
pub mod error;
pub mod event;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use error::{ApiError, ApiFuture};
pub use event::{EventCategory, EventPayload, EventRecord, StatusDetail};
pub use types::{ChunkRange, IndexNames, RangeError};
