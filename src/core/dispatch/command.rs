//! Commands carried by the dispatcher queues

use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::core::bluetooth::TransportError;
use crate::error::DispatchError;

/// Operation kinds a queued command can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Connect,
    Disconnect,
    Write,
    Read,
    EnableNotify,
    DisableNotify,
}

/// A single unit of work for a worker. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    address: String,
    service: Option<Uuid>,
    characteristic: Option<Uuid>,
    payload: Option<Vec<u8>>,
}

impl Command {
    fn new(kind: CommandKind, address: String) -> Self {
        Self {
            kind,
            address,
            service: None,
            characteristic: None,
            payload: None,
        }
    }

    fn with_attribute(kind: CommandKind, address: String, service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service: Some(service),
            characteristic: Some(characteristic),
            ..Self::new(kind, address)
        }
    }

    pub fn connect(address: String) -> Self {
        Self::new(CommandKind::Connect, address)
    }

    pub fn disconnect(address: String) -> Self {
        Self::new(CommandKind::Disconnect, address)
    }

    pub fn write(address: String, service: Uuid, characteristic: Uuid, payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            ..Self::with_attribute(CommandKind::Write, address, service, characteristic)
        }
    }

    pub fn read(address: String, service: Uuid, characteristic: Uuid) -> Self {
        Self::with_attribute(CommandKind::Read, address, service, characteristic)
    }

    pub fn enable_notify(address: String, service: Uuid, characteristic: Uuid) -> Self {
        Self::with_attribute(CommandKind::EnableNotify, address, service, characteristic)
    }

    pub fn disable_notify(address: String, service: Uuid, characteristic: Uuid) -> Self {
        Self::with_attribute(CommandKind::DisableNotify, address, service, characteristic)
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn service(&self) -> Option<Uuid> {
        self.service
    }

    pub fn characteristic(&self) -> Option<Uuid> {
        self.characteristic
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Service and characteristic together, for kinds that target an attribute
    pub fn attribute(&self) -> Result<(Uuid, Uuid), TransportError> {
        match (self.service, self.characteristic) {
            (Some(service), Some(characteristic)) => Ok((service, characteristic)),
            _ => Err(TransportError::MissingAttribute),
        }
    }
}

/// What a worker reports back: the bytes read for `Read`, nothing for the rest
pub type CommandResult = Result<Option<Vec<u8>>, TransportError>;

/// A command in flight, paired with the slot its result goes into
pub struct Job {
    pub command: Command,
    reply: oneshot::Sender<CommandResult>,
}

impl Job {
    pub fn new(command: Command) -> (Self, Pending) {
        let (reply, rx) = oneshot::channel();
        let kind = command.kind();
        (Self { command, reply }, Pending { kind, rx })
    }

    /// Hands the result to whoever holds the `Pending`. A dropped `Pending` is fine.
    pub fn complete(self, result: CommandResult) {
        let _ = self.reply.send(result);
    }
}

/// Handle to a queued command's eventual result.
///
/// Dropping it is the fire-and-forget path: the command still runs.
#[derive(Debug)]
pub struct Pending {
    kind: CommandKind,
    rx: oneshot::Receiver<CommandResult>,
}

impl Pending {
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Blocks until the worker has executed the command.
    ///
    /// # Panics
    /// Panics when called from inside an async context. Use `spawn_blocking` there,
    /// or poll with `try_result`.
    pub fn wait(self) -> Result<Option<Vec<u8>>, DispatchError> {
        match self.rx.blocking_recv() {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => Err(DispatchError::Abandoned),
        }
    }

    /// Returns the result if the command already finished, otherwise hands the handle back
    pub fn try_result(mut self) -> Result<Result<Option<Vec<u8>>, DispatchError>, Self> {
        match self.rx.try_recv() {
            Ok(result) => Ok(result.map_err(DispatchError::from)),
            Err(oneshot::error::TryRecvError::Empty) => Err(self),
            Err(oneshot::error::TryRecvError::Closed) => Ok(Err(DispatchError::Abandoned)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_constructors() {
        let service = Uuid::from_u128(1);
        let characteristic = Uuid::from_u128(2);

        let connect = Command::connect("AA:BB:CC:DD:EE:FF".to_string());
        assert_eq!(connect.kind(), CommandKind::Connect);
        assert!(connect.payload().is_none());
        assert!(matches!(connect.attribute(), Err(TransportError::MissingAttribute)));

        let write = Command::write(
            "AA:BB:CC:DD:EE:FF".to_string(),
            service,
            characteristic,
            vec![1, 2],
        );
        assert_eq!(write.kind(), CommandKind::Write);
        assert_eq!(write.payload(), Some(&[1u8, 2][..]));
        assert_eq!(write.attribute().unwrap(), (service, characteristic));
        assert_eq!(write.address(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_pending_receives_result() {
        let (job, pending) = Job::new(Command::read(
            "AA:BB:CC:DD:EE:FF".to_string(),
            Uuid::from_u128(1),
            Uuid::from_u128(2),
        ));
        assert_eq!(pending.kind(), CommandKind::Read);
        job.complete(Ok(Some(vec![7])));
        assert_eq!(pending.wait().unwrap(), Some(vec![7]));
    }

    #[test]
    fn test_pending_reports_failure() {
        let (job, pending) = Job::new(Command::connect("AA:BB:CC:DD:EE:FF".to_string()));
        job.complete(Err(TransportError::OperationFailed("timeout".to_string())));
        assert!(matches!(
            pending.wait(),
            Err(DispatchError::Transport(TransportError::OperationFailed(_)))
        ));
    }

    #[test]
    fn test_dropped_job_is_abandoned() {
        let (job, pending) = Job::new(Command::connect("AA:BB:CC:DD:EE:FF".to_string()));
        let pending = pending.try_result().unwrap_err();
        drop(job);
        assert!(matches!(pending.wait(), Err(DispatchError::Abandoned)));
    }
}
