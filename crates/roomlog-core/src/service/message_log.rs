//! Per-node append-only message log
//!
//! The log is the only shared mutable state on a node. The lock guards the
//! minimal critical section (one push or one copy) and is never held across
//! I/O: exporters take a [`MessageLog::snapshot`] and stream the copy, so a
//! stalled reader can never stall writers.

use parking_lot::Mutex;
use tracing::debug;

use roomlog_common::{Message, RoomlogError};

/// Append-only, insertion-ordered sequence of messages owned by one node
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<Message>>,
    /// Maximum number of messages, `None` when unbounded
    capacity: Option<usize>,
}

impl MessageLog {
    /// Create an unbounded log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log holding at most `capacity` messages. A capacity of 0 means unbounded.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            capacity: (capacity > 0).then_some(capacity),
        }
    }

    /// Add a message to the end of the log.
    ///
    /// Fails with [`RoomlogError::CapacityExceeded`] only when a capacity was configured
    /// and the log is full.
    pub fn append(&self, message: Message) -> Result<(), RoomlogError> {
        let len = {
            let mut messages = self.messages.lock();
            if let Some(capacity) = self.capacity
                && messages.len() >= capacity
            {
                drop(messages);
                metrics::counter!("roomlog_append_rejected_total").increment(1);
                return Err(RoomlogError::CapacityExceeded { capacity });
            }
            messages.push(message);
            messages.len()
        };

        metrics::counter!("roomlog_messages_appended_total").increment(1);
        debug!(len, "Appended message to local log");
        Ok(())
    }

    /// Point-in-time copy of the log in append order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured limit, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
