//! Last-seen cursor and bounded deduplication set.

use std::collections::{HashSet, VecDeque};

use reportflow_protocol::EventRecord;

/// Default number of identifiers remembered for deduplication.
pub const DEFAULT_DEDUP_CAPACITY: usize = 1024;

/// Lower bound for the deduplication window.
pub const MIN_DEDUP_CAPACITY: usize = 1000;

/// Verdict for an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Deliver,
    Drop,
}

/// Tracks which identified records were already delivered.
///
/// Identifiers are opaque strings and are never compared numerically. The
/// set keeps at most `capacity` identifiers and evicts the oldest first; the
/// server resumes strictly after [`resume_from`](Self::resume_from), so only
/// replays near a reconnect boundary need catching.
#[derive(Debug, Clone)]
pub struct EventCursor {
    last_seen_id: Option<String>,
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl Default for EventCursor {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_DEDUP_CAPACITY)
    }
}

impl EventCursor {
    /// Creates an empty cursor. `capacity` is raised to
    /// [`MIN_DEDUP_CAPACITY`] if smaller.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_DEDUP_CAPACITY);
        Self {
            last_seen_id: None,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Decides whether `record` should reach the handler.
    ///
    /// Records without an identifier are always delivered and never
    /// remembered.
    pub fn admit(&mut self, record: &EventRecord) -> Admission {
        let Some(id) = record.id.as_deref() else {
            return Admission::Deliver;
        };
        if self.seen.contains(id) {
            return Admission::Drop;
        }

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        self.last_seen_id = Some(id.to_string());
        Admission::Deliver
    }

    /// Identifier of the most recently delivered record.
    pub fn last_seen_id(&self) -> Option<&str> {
        self.last_seen_id.as_deref()
    }

    /// Resume parameter for the next connection, if any.
    pub fn resume_from(&self) -> Option<&str> {
        self.last_seen_id().filter(|id| !id.is_empty())
    }

    /// Returns `true` if `id` is inside the deduplication window.
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Number of remembered identifiers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
