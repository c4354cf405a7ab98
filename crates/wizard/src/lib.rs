//! Report workflow orchestration.
//!
//! [`Workflow`] walks one session through the wizard:
//!
//! 1. **Client**: create the session with the client labels
//! 2. **Upload**: transfer every file chunk by chunk, retrying failed steps
//! 3. **Process**: trigger processing once and follow the event feed
//! 4. **Results**: download the archive or ingest into Elasticsearch
//!
//! The crate has no transport dependencies; the HTTP client provides a
//! [`WorkflowApi`] and an event source.

pub mod api;
pub mod error;
pub mod types;
pub mod workflow;

// Re-export primary types for convenience.
pub use api::WorkflowApi;
pub use error::WizardError;
pub use types::{LogLine, RetryPolicy, Session, WizardStep, WorkflowConfig, WorkflowEvent};
pub use workflow::Workflow;
