//! Event stream consumer: connect, deliver, back off, reconnect.
//!
//! One [`EventStreamConsumer`] owns at most one live connection. The
//! connection runs in a spawned task that owns the [`EventCursor`], so no
//! other code can touch the dedup state. Opening a stream always closes the
//! previous one first and waits for its task to finish.

use std::sync::Arc;

use futures_util::StreamExt;
use reportflow_protocol::{EventRecord, StatusDetail};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::cursor::{Admission, EventCursor};
use crate::source::EventSource;
use crate::types::{ConsumerConfig, StreamState, TerminalReason};

/// Callback receiving every distinct record, in arrival order.
pub type EventHandler = Box<dyn FnMut(&EventRecord) + Send>;

struct ActiveStream {
    session_id: String,
    cancel: CancellationToken,
    state_rx: watch::Receiver<StreamState>,
    handle: Option<JoinHandle<()>>,
}

/// Keeps a live, ordered, deduplicated feed for one session at a time.
pub struct EventStreamConsumer {
    source: Arc<dyn EventSource>,
    config: ConsumerConfig,
    active: Option<ActiveStream>,
}

impl EventStreamConsumer {
    pub fn new(source: Arc<dyn EventSource>, config: ConsumerConfig) -> Self {
        Self {
            source,
            config,
            active: None,
        }
    }

    /// Starts consuming `session_id`'s feed, delivering records to `handler`.
    ///
    /// Any stream for a different session is closed first. If the same
    /// session is already streaming or has terminated, this is a no-op and
    /// returns `false`.
    pub async fn open(&mut self, session_id: &str, handler: EventHandler) -> bool {
        if let Some(active) = &self.active {
            if active.session_id == session_id {
                debug!(
                    session = %session_id,
                    state = ?*active.state_rx.borrow(),
                    "event stream already opened for session, ignoring"
                );
                return false;
            }
        }

        self.close().await;

        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(StreamState::Connecting);
        let task = StreamTask {
            session_id: session_id.to_string(),
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            cancel: cancel.clone(),
            state_tx,
        };
        let handle = tokio::spawn(task.run(handler));

        info!(session = %session_id, "event stream opened");
        self.active = Some(ActiveStream {
            session_id: session_id.to_string(),
            cancel,
            state_rx,
            handle: Some(handle),
        });
        true
    }

    /// Closes the live connection and any pending backoff timer, and waits
    /// for the connection task to exit.
    ///
    /// The session stays recorded as `Terminated(Cancelled)`.
    pub async fn close(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.cancel.cancel();
        if let Some(handle) = active.handle.take() {
            if let Err(e) = handle.await {
                warn!(session = %active.session_id, error = %e, "event stream task failed");
            }
            debug!(session = %active.session_id, "event stream closed");
        }
    }

    /// Closes the stream and forgets its session, so the next [`open`]
    /// starts a new connection with an empty cursor even for the same
    /// session.
    ///
    /// [`open`]: Self::open
    pub async fn discard(&mut self) {
        self.close().await;
        if let Some(active) = self.active.take() {
            debug!(session = %active.session_id, "event stream discarded");
        }
    }

    /// Session of the current (or last) stream.
    pub fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.session_id.as_str())
    }

    /// Current state, or `None` if nothing was ever opened.
    pub fn state(&self) -> Option<StreamState> {
        self.active.as_ref().map(|a| a.state_rx.borrow().clone())
    }

    /// Watches state changes of the current stream.
    pub fn subscribe_state(&self) -> Option<watch::Receiver<StreamState>> {
        self.active.as_ref().map(|a| a.state_rx.clone())
    }

    /// Waits until the current stream terminates and returns why.
    ///
    /// Returns `None` if no stream was opened or its task died without
    /// reaching a terminal state.
    pub async fn wait_terminated(&self) -> Option<TerminalReason> {
        let mut rx = self.subscribe_state()?;
        let state = rx.wait_for(StreamState::is_terminated).await.ok()?;
        state.terminal_reason()
    }
}

impl Drop for EventStreamConsumer {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

/// Everything the connection task owns.
struct StreamTask {
    session_id: String,
    source: Arc<dyn EventSource>,
    config: ConsumerConfig,
    cancel: CancellationToken,
    state_tx: watch::Sender<StreamState>,
}

enum FeedOutcome {
    Terminated(TerminalReason),
    Disconnected,
}

impl StreamTask {
    async fn run(self, mut handler: EventHandler) {
        let mut cursor = EventCursor::with_capacity(self.config.dedup_capacity);
        let mut attempt: u32 = 0;

        loop {
            self.state_tx.send_replace(StreamState::Connecting);
            let from = cursor.resume_from().map(str::to_string);
            debug!(session = %self.session_id, from = ?from, "connecting to event stream");

            let connect = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.finish(TerminalReason::Cancelled),
                result = self.source.connect(self.session_id.clone(), from) => result,
            };

            match connect {
                Ok(feed) => {
                    attempt = 0;
                    self.state_tx.send_replace(StreamState::Open);
                    debug!(session = %self.session_id, "event stream connected");

                    match self.consume(feed, &mut cursor, &mut handler).await {
                        FeedOutcome::Terminated(reason) => return self.finish(reason),
                        FeedOutcome::Disconnected => {}
                    }
                }
                Err(e) => {
                    warn!(
                        session = %self.session_id,
                        attempt = attempt + 1,
                        error = %e,
                        "event stream connection failed"
                    );
                }
            }

            attempt = attempt.saturating_add(1);
            let delay = self.config.reconnect.delay_for_attempt(attempt);
            let deadline = Instant::now() + delay;
            self.state_tx
                .send_replace(StreamState::Backoff { attempt, deadline });
            info!(
                session = %self.session_id,
                attempt,
                delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
                "reconnecting event stream"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.finish(TerminalReason::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    /// Reads one connection until it drops or a terminal status arrives.
    ///
    /// The feed is dropped on return, so nothing past a terminal record is
    /// ever read.
    async fn consume(
        &self,
        mut feed: crate::source::EventFeed,
        cursor: &mut EventCursor,
        handler: &mut EventHandler,
    ) -> FeedOutcome {
        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return FeedOutcome::Terminated(TerminalReason::Cancelled),
                item = feed.next() => item,
            };

            match item {
                Some(Ok(record)) => {
                    if cursor.admit(&record) == Admission::Drop {
                        trace!(session = %self.session_id, id = ?record.id, "dropping duplicate event");
                        continue;
                    }
                    handler(&record);

                    if let Some(status) = record.terminal_status() {
                        return FeedOutcome::Terminated(match status {
                            StatusDetail::Done => TerminalReason::Done,
                            StatusDetail::Error => TerminalReason::Error,
                        });
                    }
                }
                Some(Err(e)) => {
                    warn!(session = %self.session_id, error = %e, "event stream interrupted");
                    return FeedOutcome::Disconnected;
                }
                None => {
                    debug!(session = %self.session_id, "event stream closed by server");
                    return FeedOutcome::Disconnected;
                }
            }
        }
    }

    fn finish(&self, reason: TerminalReason) {
        self.state_tx.send_replace(StreamState::Terminated(reason));
        match reason {
            TerminalReason::Cancelled => debug!(session = %self.session_id, "event stream cancelled"),
            _ => info!(session = %self.session_id, reason = ?reason, "event stream terminated"),
        }
    }
}
