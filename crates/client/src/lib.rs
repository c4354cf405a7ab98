//! HTTP client for the report-processing session API.
//!
//! [`ApiClient`] talks to the service with `reqwest` and implements the
//! transport seams of the other crates: [`UploadApi`], [`EventSource`] and
//! [`WorkflowApi`].
//!
//! [`UploadApi`]: reportflow_transfer::UploadApi
//! [`EventSource`]: reportflow_event_stream::EventSource
//! [`WorkflowApi`]: reportflow_wizard::WorkflowApi

pub mod client;
mod events;
mod seams;

pub use client::ApiClient;
