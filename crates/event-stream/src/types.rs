//! Public types for the event stream consumer.

use std::time::Duration;

use tokio::time::Instant;

use crate::cursor::DEFAULT_DEDUP_CAPACITY;

/// Why a stream stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// Server reported `status|done`.
    Done,
    /// Server reported `status|error`.
    Error,
    /// The caller closed the stream.
    Cancelled,
}

/// Connection state of one session's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Opening the streaming request.
    Connecting,
    /// Connected and receiving records.
    Open,
    /// Waiting until `deadline` before reconnecting.
    Backoff { attempt: u32, deadline: Instant },
    /// Absorbing: no further connection attempts.
    Terminated(TerminalReason),
}

impl StreamState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    /// Terminal reason, if terminated.
    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        match self {
            Self::Terminated(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Configuration for reconnection with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Fixed delay between attempts, no growth.
    pub fn constant(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            backoff_factor: 1.0,
        }
    }

    /// Calculates the delay for a given attempt number (1-based),
    /// with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        Duration::from_secs_f64(with_jitter(capped, nanos))
    }
}

/// Spreads `secs` over ±25% using the sub-second clock reading as the
/// random source.
fn with_jitter(secs: f64, nanos: u32) -> f64 {
    let offset = (nanos as f64 / 1_000_000_000.0) * 2.0 - 1.0; // [-1.0, 1.0)
    (secs + secs * 0.25 * offset).max(0.05)
}

/// Settings for an [`EventStreamConsumer`](crate::EventStreamConsumer).
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub reconnect: ReconnectConfig,
    /// Size of the deduplication window.
    pub dedup_capacity: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}
