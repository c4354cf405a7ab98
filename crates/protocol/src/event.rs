//! Progress records pushed over the session event feed.
//!
//! Every record carries a payload of the form `category|detail`. The server
//! may prefix ordinary log lines with a unix timestamp
//! (`1718000000.5|info|Opening report.csv`); the terminal marker is always
//! the bare `status|done` or `status|error`.

use std::fmt;

/// One record received from the event feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Server-assigned identifier. Opaque: compared verbatim, never parsed.
    pub id: Option<String>,
    /// Raw payload text.
    pub data: String,
}

impl EventRecord {
    /// Creates a record with an identifier.
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            data: data.into(),
        }
    }

    /// Creates a record without an identifier.
    pub fn anonymous(data: impl Into<String>) -> Self {
        Self {
            id: None,
            data: data.into(),
        }
    }

    /// Parses the payload into its parts.
    pub fn payload(&self) -> EventPayload {
        EventPayload::parse(&self.data)
    }

    /// Returns the terminal status carried by this record, if any.
    pub fn terminal_status(&self) -> Option<StatusDetail> {
        self.payload().terminal_status()
    }
}

/// Category prefix of an event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventCategory {
    Status,
    Info,
    Warning,
    Error,
    Success,
    /// Unrecognised category, kept verbatim.
    Other(String),
}

impl EventCategory {
    fn parse(s: &str) -> Self {
        match s.trim() {
            "status" => Self::Status,
            "info" => Self::Info,
            "warning" => Self::Warning,
            "error" => Self::Error,
            "success" => Self::Success,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire name of the category.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Status => "status",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal processing status reported by a `status|…` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDetail {
    Done,
    Error,
}

/// Parsed `[timestamp|]category|detail` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub timestamp: Option<f64>,
    pub category: EventCategory,
    pub detail: String,
}

impl EventPayload {
    /// Parses payload text.
    ///
    /// Text without any `|` separator yields an empty `Other` category with
    /// the whole text as detail. The detail itself may contain `|`.
    pub fn parse(text: &str) -> Self {
        let Some((first, rest)) = text.split_once('|') else {
            return Self {
                timestamp: None,
                category: EventCategory::Other(String::new()),
                detail: text.to_string(),
            };
        };

        if let (Ok(ts), Some((category, detail))) = (first.trim().parse::<f64>(), rest.split_once('|'))
        {
            return Self {
                timestamp: Some(ts),
                category: EventCategory::parse(category),
                detail: detail.to_string(),
            };
        }

        Self {
            timestamp: None,
            category: EventCategory::parse(first),
            detail: rest.to_string(),
        }
    }

    /// Returns the terminal status if this is `status|done` or `status|error`.
    pub fn terminal_status(&self) -> Option<StatusDetail> {
        if self.category != EventCategory::Status {
            return None;
        }
        match self.detail.trim() {
            "done" => Some(StatusDetail::Done),
            "error" => Some(StatusDetail::Error),
            _ => None,
        }
    }
}
