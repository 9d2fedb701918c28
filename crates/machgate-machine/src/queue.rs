//! Command queue
//!
//! Bounded FIFO of discrete command byte-strings with exactly one
//! consumer. Producers are rejected when the queue is full rather than
//! blocked: the typical producer is an HTTP handler that must not be held
//! hostage by machine slowness.

use machgate_core::Error;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

/// Bounded FIFO drained by the Tx consumer.
pub struct CommandQueue {
    commands: Mutex<VecDeque<Vec<u8>>>,
    capacity: usize,
    available: Notify,
}

impl CommandQueue {
    /// Create a queue holding at most `capacity` commands.
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            available: Notify::new(),
        }
    }

    /// Append a command. Never blocks; a full queue rejects with
    /// [`Error::ResourceExhausted`].
    pub fn push(&self, command: Vec<u8>) -> Result<(), Error> {
        {
            let mut commands = self.commands.lock();
            if commands.len() >= self.capacity {
                return Err(Error::ResourceExhausted {
                    what: "command queue",
                });
            }
            commands.push_back(command);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Remove the oldest command, waiting until one is available. Single
    /// consumer only: two concurrent `pop` calls may contend for one
    /// wakeup.
    pub async fn pop(&self) -> Vec<u8> {
        loop {
            // Register for a wakeup before the emptiness check so a push
            // between check and await is not missed.
            let notified = self.available.notified();
            if let Some(command) = self.commands.lock().pop_front() {
                return command;
            }
            notified.await;
        }
    }

    /// Drop every queued command.
    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    /// Number of commands currently queued.
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fifo_order_and_bound() {
        let queue = CommandQueue::new(2);
        queue.push(b"G28".to_vec()).unwrap();
        queue.push(b"G1 X10".to_vec()).unwrap();

        let err = queue.push(b"M400".to_vec()).unwrap_err();
        assert!(matches!(err, Error::ResourceExhausted { .. }));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_pop_returns_oldest_first() {
        let queue = CommandQueue::new(8);
        queue.push(b"first".to_vec()).unwrap();
        queue.push(b"second".to_vec()).unwrap();

        assert_eq!(queue.pop().await, b"first");
        assert_eq!(queue.pop().await, b"second");
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(CommandQueue::new(8));

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!consumer.is_finished());

        queue.push(b"G28".to_vec()).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer should wake")
            .unwrap();
        assert_eq!(got, b"G28");
    }

    #[test]
    fn test_clear_empties_the_queue() {
        let queue = CommandQueue::new(4);
        queue.push(b"G28".to_vec()).unwrap();
        queue.push(b"M400".to_vec()).unwrap();

        queue.clear();
        assert!(queue.is_empty());
        queue.push(b"G90".to_vec()).unwrap();
        assert_eq!(queue.len(), 1);
    }
}
