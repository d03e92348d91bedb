//! Command queues
//! Unbounded FIFO channels with any number of producers and exactly one consumer.
//! The consumer blocks on its own OS thread; dropping the sender closes the queue.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::dispatch::command::Job;
use crate::error::DispatchError;

/// Which of the two queues a command travels on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Connection lifecycle and safe writes, strict submission order
    Ordered,
    /// Latency-sensitive writes, isolated from the ordered backlog
    FastPath,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Ordered => write!(f, "ordered"),
            Lane::FastPath => write!(f, "fast-path"),
        }
    }
}

/// Creates a connected sender/receiver pair for one lane
pub fn command_queue(lane: Lane) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        QueueSender {
            lane,
            tx,
            depth: depth.clone(),
        },
        QueueReceiver { lane, rx, depth },
    )
}

/// Producer side. Cheap to clone; every clone feeds the same FIFO.
#[derive(Clone)]
pub struct QueueSender {
    lane: Lane,
    tx: mpsc::UnboundedSender<Job>,
    depth: Arc<AtomicUsize>,
}

impl QueueSender {
    /// Appends a job. Never blocks on I/O.
    pub fn push(&self, job: Job) -> Result<(), DispatchError> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(DispatchError::QueueClosed(self.lane));
        }
        Ok(())
    }

    /// Jobs queued and not yet taken by the consumer
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

/// Consumer side, owned by exactly one worker
pub struct QueueReceiver {
    lane: Lane,
    rx: mpsc::UnboundedReceiver<Job>,
    depth: Arc<AtomicUsize>,
}

impl QueueReceiver {
    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Blocks until a job is available. Returns `None` once every sender is gone
    /// and the queue is empty, so items queued before closing are still handed out.
    ///
    /// Must be called from a plain thread, never from inside an async context.
    pub fn pop(&mut self) -> Option<Job> {
        let job = self.rx.blocking_recv()?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch::command::Command;

    fn job(address: &str) -> Job {
        Job::new(Command::connect(address.to_string())).0
    }

    #[test]
    fn test_fifo_across_producers() {
        let (tx, mut rx) = command_queue(Lane::Ordered);
        let second_producer = tx.clone();

        tx.push(job("00:00:00:00:00:01")).unwrap();
        second_producer.push(job("00:00:00:00:00:02")).unwrap();
        tx.push(job("00:00:00:00:00:03")).unwrap();
        assert_eq!(tx.depth(), 3);

        let order: Vec<String> = (0..3)
            .map(|_| rx.pop().unwrap().command.address().to_string())
            .collect();
        assert_eq!(
            order,
            vec!["00:00:00:00:00:01", "00:00:00:00:00:02", "00:00:00:00:00:03"]
        );
        assert_eq!(tx.depth(), 0);
    }

    #[test]
    fn test_closed_queue_drains_then_ends() {
        let (tx, mut rx) = command_queue(Lane::FastPath);
        tx.push(job("00:00:00:00:00:01")).unwrap();
        tx.push(job("00:00:00:00:00:02")).unwrap();
        drop(tx);

        assert!(rx.pop().is_some());
        assert!(rx.pop().is_some());
        assert!(rx.pop().is_none());
    }

    #[test]
    fn test_push_after_consumer_gone_fails() {
        let (tx, rx) = command_queue(Lane::Ordered);
        drop(rx);
        let err = tx.push(job("00:00:00:00:00:01")).unwrap_err();
        assert!(matches!(err, DispatchError::QueueClosed(Lane::Ordered)));
        assert_eq!(tx.depth(), 0);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let (tx, mut rx) = command_queue(Lane::Ordered);
        let consumer = std::thread::spawn(move || rx.pop().map(|job| job.command.address().to_string()));

        std::thread::sleep(std::time::Duration::from_millis(50));
        tx.push(job("00:00:00:00:00:09")).unwrap();

        assert_eq!(consumer.join().unwrap().as_deref(), Some("00:00:00:00:00:09"));
    }
}
