//! Data types for the report workflow.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reportflow_event_stream::ConsumerConfig;
use reportflow_protocol::{EventCategory, EventPayload, IndexNames};
use reportflow_transfer::{DEFAULT_CHUNK_SIZE, UploadProgress};

/// Wizard step, in the order the user walks them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    #[default]
    Client,
    Upload,
    Process,
    Results,
}

impl WizardStep {
    /// 1-based position shown to the user.
    pub fn number(self) -> u8 {
        match self {
            Self::Client => 1,
            Self::Upload => 2,
            Self::Process => 3,
            Self::Results => 4,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Client => "client",
            Self::Upload => "upload",
            Self::Process => "process",
            Self::Results => "results",
        };
        write!(f, "{}. {label}", self.number())
    }
}

/// A server-side processing session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub client: String,
    pub sub_client: Option<String>,
    pub step: WizardStep,
    pub indices: IndexNames,
}

/// One entry of the activity log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub category: EventCategory,
    pub detail: String,
}

impl LogLine {
    /// A line stamped with the current time.
    pub fn now(category: EventCategory, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            detail: detail.into(),
        }
    }

    /// A line built from an event payload, keeping the server's timestamp
    /// when it sent one.
    pub fn from_payload(payload: EventPayload) -> Self {
        let timestamp = payload
            .timestamp
            .and_then(|ts| {
                let secs = ts.trunc() as i64;
                let nanos = (ts.fract() * 1e9) as u32;
                DateTime::from_timestamp(secs, nanos)
            })
            .unwrap_or_else(Utc::now);
        Self {
            timestamp,
            category: payload.category,
            detail: payload.detail,
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.category,
            self.detail
        )
    }
}

/// Notification emitted while the workflow runs.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// The wizard moved to another step.
    StepChanged(WizardStep),
    /// A chunk of a file was acknowledged.
    UploadProgress(UploadProgress),
    /// A line was appended to the activity log.
    Log(LogLine),
    /// The event feed delivered a terminal status.
    ProcessingFinished { success: bool },
}

/// Retries for the upload steps (allocation, chunk, completion).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per step, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Config passed to the workflow.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub chunk_size: u64,
    pub retry: RetryPolicy,
    pub stream: ConsumerConfig,
    /// Initial index names for new sessions.
    pub indices: IndexNames,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            stream: ConsumerConfig::default(),
            indices: IndexNames::default(),
        }
    }
}
