//! Bounded, lossy mailbox between the request path and the rebalance worker.
//!
//! Publishing never waits. When the mailbox is full, or the worker is gone,
//! the event is dropped and a warning is logged; the request that produced
//! it still succeeds.

use crate::logging::SharedLogger;
use tokio::sync::mpsc::{self, error::TrySendError};

/// A user's active flag changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceEvent {
    pub user_id: String,
    pub is_active: bool,
}

impl RebalanceEvent {
    pub fn new(user_id: impl Into<String>, is_active: bool) -> Self {
        Self {
            user_id: user_id.into(),
            is_active,
        }
    }
}

/// Sending half of the rebalance mailbox. Cheap to clone.
#[derive(Clone)]
pub struct RebalancePublisher {
    tx: mpsc::Sender<RebalanceEvent>,
    logger: SharedLogger,
}

impl RebalancePublisher {
    /// Enqueue an event without blocking.
    ///
    /// # Returns
    /// `true` if the event was accepted, `false` if it was dropped.
    pub fn publish(&self, event: RebalanceEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.logger.warn(&format!(
                    "Rebalance queue is full, dropping event for user {} (is_active={})",
                    event.user_id, event.is_active
                ));
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.logger.warn(&format!(
                    "Rebalance worker is not running, dropping event for user {} (is_active={})",
                    event.user_id, event.is_active
                ));
                false
            }
        }
    }
}

/// Create the mailbox. A capacity of zero is raised to one.
pub fn channel(
    capacity: usize,
    logger: SharedLogger,
) -> (RebalancePublisher, mpsc::Receiver<RebalanceEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RebalancePublisher { tx, logger }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;
    use log::Level;

    #[tokio::test]
    async fn test_publish_and_receive_in_order() {
        let logger = MemoryLogger::new();
        let (publisher, mut rx) = channel(4, logger.clone());

        assert!(publisher.publish(RebalanceEvent::new("u1", false)));
        assert!(publisher.publish(RebalanceEvent::new("u2", true)));

        assert_eq!(rx.recv().await, Some(RebalanceEvent::new("u1", false)));
        assert_eq!(rx.recv().await, Some(RebalanceEvent::new("u2", true)));
        assert!(logger.entries().is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_warns() {
        let logger = MemoryLogger::new();
        let (publisher, mut rx) = channel(1, logger.clone());

        assert!(publisher.publish(RebalanceEvent::new("u1", true)));
        assert!(!publisher.publish(RebalanceEvent::new("u2", true)));

        let warnings = logger.messages_at(Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("u2"));

        // The dropped event is gone for good.
        assert_eq!(rx.recv().await, Some(RebalanceEvent::new("u1", true)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_drops_and_warns() {
        let logger = MemoryLogger::new();
        let (publisher, rx) = channel(8, logger.clone());
        drop(rx);

        assert!(!publisher.publish(RebalanceEvent::new("u1", false)));
        assert_eq!(logger.messages_at(Level::Warn).len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (publisher, _rx) = channel(0, MemoryLogger::new());
        assert!(publisher.publish(RebalanceEvent::new("u1", true)));
    }
}
