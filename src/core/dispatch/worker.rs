//! Queue workers
//! Each worker is a dedicated OS thread draining one queue. Commands run one at a
//! time, in the order they were queued, against the shared transport.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};
use serde::Serialize;
use tokio::runtime::Handle;

use crate::core::bluetooth::{NotificationSink, Transport, TransportError};
use crate::core::dispatch::command::{Command, CommandKind, CommandResult};
use crate::core::dispatch::queue::{Lane, QueueReceiver};

/// Counters for one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub executed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    executed: AtomicU64,
    failed: AtomicU64,
}

pub struct Worker {
    lane: Lane,
    handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl Worker {
    /// Name given to the thread serving `lane`
    pub fn thread_name(lane: Lane) -> &'static str {
        match lane {
            Lane::Ordered => "ble-ordered-worker",
            Lane::FastPath => "ble-fast-worker",
        }
    }

    /// Starts the consumer thread. The thread exits once the queue is closed and drained.
    pub fn spawn(
        mut queue: QueueReceiver,
        transport: Arc<dyn Transport>,
        runtime: Handle,
        notifications: NotificationSink,
    ) -> io::Result<Self> {
        let lane = queue.lane();
        let counters = Arc::new(Counters::default());
        let counters_for_thread = counters.clone();

        let handle = thread::Builder::new()
            .name(Self::thread_name(lane).to_string())
            .spawn(move || {
                info!("[{}] worker started", lane);
                while let Some(job) = queue.pop() {
                    let result = execute(
                        &runtime,
                        transport.as_ref(),
                        &job.command,
                        lane == Lane::FastPath,
                        &notifications,
                    );

                    counters_for_thread.executed.fetch_add(1, Ordering::Relaxed);
                    match &result {
                        Ok(_) => debug!(
                            "[{}] {:?} for {} done",
                            lane,
                            job.command.kind(),
                            job.command.address()
                        ),
                        Err(e) => {
                            counters_for_thread.failed.fetch_add(1, Ordering::Relaxed);
                            error!(
                                "[{}] {:?} for {} failed: {}",
                                lane,
                                job.command.kind(),
                                job.command.address(),
                                e
                            );
                        }
                    }
                    job.complete(result);
                }
                info!("[{}] queue closed, worker exiting", lane);
            })?;

        Ok(Self {
            lane,
            handle: Some(handle),
            counters,
        })
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            executed: self.counters.executed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Waits for the thread to finish. The queue must already be closed.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("[{}] worker thread panicked", self.lane);
            }
        }
    }
}

/// Runs one command to completion. A panicking transport becomes a failed result.
fn execute(
    runtime: &Handle,
    transport: &dyn Transport,
    command: &Command,
    fast: bool,
    notifications: &NotificationSink,
) -> CommandResult {
    panic::catch_unwind(AssertUnwindSafe(|| {
        runtime.block_on(run_command(transport, command, fast, notifications))
    }))
    .unwrap_or_else(|panic| {
        Err(TransportError::OperationFailed(format!(
            "transport panicked: {}",
            panic_message(panic.as_ref())
        )))
    })
}

async fn run_command(
    transport: &dyn Transport,
    command: &Command,
    fast: bool,
    notifications: &NotificationSink,
) -> CommandResult {
    let address = command.address();
    match command.kind() {
        CommandKind::Connect => transport.connect(address).await.map(|_| None),
        CommandKind::Disconnect => transport.disconnect(address).await.map(|_| None),
        CommandKind::Write => {
            let (service, characteristic) = command.attribute()?;
            let payload = command.payload().unwrap_or_default();
            transport
                .write(address, service, characteristic, payload, fast)
                .await
                .map(|_| None)
        }
        CommandKind::Read => {
            let (service, characteristic) = command.attribute()?;
            transport.read(address, service, characteristic).await.map(Some)
        }
        CommandKind::EnableNotify => {
            let (service, characteristic) = command.attribute()?;
            transport
                .subscribe(address, service, characteristic, notifications.clone())
                .await
                .map(|_| None)
        }
        CommandKind::DisableNotify => {
            let (service, characteristic) = command.attribute()?;
            transport
                .unsubscribe(address, service, characteristic)
                .await
                .map(|_| None)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
