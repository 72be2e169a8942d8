//! Outbound Command Queue
//!
//! Bounded FIFO between the HTTP handlers and the serial write loop. A full
//! queue makes `enqueue` wait; commands are never dropped here.

use crate::error::BridgeError;
use crate::metric;
use rig_protocol::Command;
use tokio::sync::mpsc;
use tracing::debug;

/// Default number of commands that may wait for the write loop
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Create a bounded command queue
///
/// # Panics
/// Panics if `capacity` is zero.
pub fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Producer side, cloned into every request handler
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
}

impl CommandSender {
    /// Queue a command, waiting while the queue is full
    pub async fn enqueue(&self, command: Command) -> Result<(), BridgeError> {
        debug!("Queueing command {:?}", command.as_str());
        self.tx
            .send(command)
            .await
            .map_err(|_| BridgeError::QueueClosed)?;
        metrics::counter!(metric::COMMANDS_QUEUED).increment(1);
        Ok(())
    }

    /// Number of commands waiting for the write loop
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Maximum number of waiting commands
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Check whether the consumer is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, owned by the write loop
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
}

impl CommandReceiver {
    /// Wait for the next command; `None` once every sender is dropped
    pub async fn next(&mut self) -> Option<Command> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_protocol::{ControlCode, Vfo};
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_round_trip() {
        let (tx, mut rx) = command_queue(64);
        let sent: Vec<Command> = (0..50)
            .map(|i| Command::frequency(Vfo::A, i as f64).unwrap())
            .collect();

        for cmd in &sent {
            tx.enqueue(cmd.clone()).await.unwrap();
        }
        assert_eq!(tx.pending(), 50);
        drop(tx);

        let mut drained = Vec::new();
        while let Some(cmd) = rx.next().await {
            drained.push(cmd);
        }
        assert_eq!(drained, sent);
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() {
        let (tx, mut rx) = command_queue(1);
        tx.enqueue(Command::control(ControlCode::Fr0)).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            tx.enqueue(Command::control(ControlCode::Fr1)),
        )
        .await;
        assert!(blocked.is_err(), "enqueue should wait while the queue is full");

        assert_eq!(rx.next().await, Some(Command::control(ControlCode::Fr0)));
        tx.enqueue(Command::control(ControlCode::Fr1)).await.unwrap();
        assert_eq!(rx.next().await, Some(Command::control(ControlCode::Fr1)));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (tx, rx) = command_queue(4);
        drop(rx);
        assert!(tx.is_closed());
        let err = tx.enqueue(Command::query_frequency(Vfo::A)).await.unwrap_err();
        assert!(matches!(err, BridgeError::QueueClosed));
    }

    #[test]
    fn test_capacity() {
        let (tx, _rx) = command_queue(DEFAULT_QUEUE_CAPACITY);
        assert_eq!(tx.capacity(), DEFAULT_QUEUE_CAPACITY);
        assert_eq!(tx.pending(), 0);
    }
}
