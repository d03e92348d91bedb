//! Dispatcher facade
//! The public entry point. Queued operations are validated here, wrapped in a
//! command and routed to the ordered or fast-path queue; scan, RSSI and MTU run
//! inline on the caller's thread.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::config::dispatcher_config::DispatcherConfig;
use crate::core::bluetooth::constants::{MAX_ATT_MTU, MIN_ATT_MTU};
use crate::core::bluetooth::{
    Backend, DeviceRecord, Notification, NotificationSink, Transport, select_transport,
};
use crate::core::dispatch::cache::DiscoveryCache;
use crate::core::dispatch::command::{Command, Job, Pending};
use crate::core::dispatch::queue::{Lane, QueueSender, command_queue};
use crate::core::dispatch::worker::{Worker, WorkerStats};
use crate::error::DispatchError;
use crate::utils::{decode_hex, parse_address, parse_uuid};

/// Serializes device operations onto two worker queues.
///
/// `Dispatcher` is `Send + Sync`; share it behind an `Arc` to submit from several threads.
/// Dropping it closes both queues, lets the workers drain what was already queued and
/// joins them. `scan`, `query_rssi`, `set_mtu` and `Pending::wait` block the caller,
/// and the dispatcher must be dropped outside of any async context.
pub struct Dispatcher {
    config: DispatcherConfig,
    transport: Arc<dyn Transport>,
    cache: DiscoveryCache,
    notifications: NotificationSink,
    ordered: Option<QueueSender>,
    fast: Option<QueueSender>,
    ordered_worker: Worker,
    fast_worker: Worker,
    runtime: Option<Runtime>,
}

impl Dispatcher {
    /// Creates a dispatcher, probing once for a radio adapter.
    /// Without one the simulation backend is used.
    pub fn new(config: AppConfig) -> Result<Self, DispatchError> {
        let runtime = build_runtime(&config.dispatcher)?;
        let transport = select_transport(&config, runtime.handle());
        Self::start(config.dispatcher, runtime, transport)
    }

    /// Creates a dispatcher around an explicit backend
    pub fn with_transport(
        config: DispatcherConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, DispatchError> {
        let runtime = build_runtime(&config)?;
        Self::start(config, runtime, transport)
    }

    fn start(
        config: DispatcherConfig,
        runtime: Runtime,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, DispatchError> {
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));

        let (ordered, ordered_rx) = command_queue(Lane::Ordered);
        let (fast, fast_rx) = command_queue(Lane::FastPath);

        let ordered_worker = Worker::spawn(
            ordered_rx,
            transport.clone(),
            runtime.handle().clone(),
            notifications.clone(),
        )?;
        let fast_worker = Worker::spawn(
            fast_rx,
            transport.clone(),
            runtime.handle().clone(),
            notifications.clone(),
        )?;

        info!("Dispatcher started on the {} backend", transport.backend());
        Ok(Self {
            config,
            transport,
            cache: DiscoveryCache::new(),
            notifications,
            ordered: Some(ordered),
            fast: Some(fast),
            ordered_worker,
            fast_worker,
            runtime: Some(runtime),
        })
    }

    pub fn backend(&self) -> Backend {
        self.transport.backend()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    fn block_on<F: std::future::Future>(&self, future: F) -> Result<F::Output, DispatchError> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.block_on(future)),
            None => Err(DispatchError::Stopped),
        }
    }

    /// Scans for `duration`, recording every device seen. Returns how many were seen.
    ///
    /// # Panics
    /// Blocks the calling thread, so it panics when called from inside an async
    /// context. From async code, call it through `tokio::task::spawn_blocking`.
    pub fn scan(&self, duration: Duration) -> Result<usize, DispatchError> {
        let devices = self.block_on(self.transport.scan(duration))??;
        let count = devices.len();
        self.cache.record_all(devices);
        info!("Scan recorded {} device(s), {} cached", count, self.cache.len());
        Ok(count)
    }

    /// Up to `limit` devices from the discovery cache
    pub fn get_scan_results(&self, limit: usize) -> Vec<DeviceRecord> {
        self.cache.snapshot(limit)
    }

    pub fn discovery_cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    fn enqueue(&self, lane: Lane, command: Command) -> Result<Pending, DispatchError> {
        let sender = match lane {
            Lane::Ordered => self.ordered.as_ref(),
            Lane::FastPath => self.fast.as_ref(),
        }
        .ok_or(DispatchError::QueueClosed(lane))?;

        debug!(
            "Queueing {:?} for {} on the {} queue",
            command.kind(),
            command.address(),
            lane
        );
        let (job, pending) = Job::new(command);
        sender.push(job)?;
        Ok(pending)
    }

    /// Queues a connect. Returns as soon as the command is queued.
    pub fn connect(&self, address: &str) -> Result<Pending, DispatchError> {
        let address = parse_address(address)?;
        self.enqueue(Lane::Ordered, Command::connect(address))
    }

    pub fn disconnect(&self, address: &str) -> Result<Pending, DispatchError> {
        let address = parse_address(address)?;
        self.enqueue(Lane::Ordered, Command::disconnect(address))
    }

    /// Queues a write: on the fast-path queue when `fast` is set, otherwise behind
    /// everything already on the ordered queue.
    pub fn write(
        &self,
        address: &str,
        service: &str,
        characteristic: &str,
        payload: &[u8],
        fast: bool,
    ) -> Result<Pending, DispatchError> {
        let (address, service, characteristic) = parse_target(address, service, characteristic)?;
        let lane = if fast { Lane::FastPath } else { Lane::Ordered };
        self.enqueue(
            lane,
            Command::write(address, service, characteristic, payload.to_vec()),
        )
    }

    /// Same as `write`, with the payload given as hex (two characters per byte)
    pub fn write_hex(
        &self,
        address: &str,
        service: &str,
        characteristic: &str,
        hex_payload: &str,
        fast: bool,
    ) -> Result<Pending, DispatchError> {
        let payload = decode_hex(hex_payload)?;
        self.write(address, service, characteristic, &payload, fast)
    }

    /// Queues a read; the bytes arrive through the returned handle
    pub fn read(
        &self,
        address: &str,
        service: &str,
        characteristic: &str,
    ) -> Result<Pending, DispatchError> {
        let (address, service, characteristic) = parse_target(address, service, characteristic)?;
        self.enqueue(Lane::Ordered, Command::read(address, service, characteristic))
    }

    /// Queues a subscription; values show up on `notifications()`
    pub fn enable_notify(
        &self,
        address: &str,
        service: &str,
        characteristic: &str,
    ) -> Result<Pending, DispatchError> {
        let (address, service, characteristic) = parse_target(address, service, characteristic)?;
        self.enqueue(
            Lane::Ordered,
            Command::enable_notify(address, service, characteristic),
        )
    }

    pub fn disable_notify(
        &self,
        address: &str,
        service: &str,
        characteristic: &str,
    ) -> Result<Pending, DispatchError> {
        let (address, service, characteristic) = parse_target(address, service, characteristic)?;
        self.enqueue(
            Lane::Ordered,
            Command::disable_notify(address, service, characteristic),
        )
    }

    /// Queries signal strength inline, bypassing the queues
    ///
    /// # Panics
    /// Blocks the calling thread, so it panics when called from inside an async
    /// context. From async code, call it through `tokio::task::spawn_blocking`.
    pub fn query_rssi(&self, address: &str) -> Result<i16, DispatchError> {
        let address = parse_address(address)?;
        Ok(self.block_on(self.transport.rssi(&address))??)
    }

    /// Requests an ATT MTU inline, bypassing the queues
    ///
    /// # Panics
    /// Blocks the calling thread, so it panics when called from inside an async
    /// context. From async code, call it through `tokio::task::spawn_blocking`.
    pub fn set_mtu(&self, address: &str, size: i64) -> Result<bool, DispatchError> {
        let address = parse_address(address)?;
        let mtu = u16::try_from(size)
            .ok()
            .filter(|mtu| (MIN_ATT_MTU..=MAX_ATT_MTU).contains(mtu))
            .ok_or(DispatchError::MtuOutOfRange {
                requested: size,
                min: MIN_ATT_MTU,
                max: MAX_ATT_MTU,
            })?;
        Ok(self.block_on(self.transport.set_mtu(&address, mtu))??)
    }

    /// Subscribes to notifications from every enabled characteristic
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Commands waiting on `lane`, not counting the one being executed
    pub fn queue_depth(&self, lane: Lane) -> usize {
        let sender = match lane {
            Lane::Ordered => self.ordered.as_ref(),
            Lane::FastPath => self.fast.as_ref(),
        };
        sender.map(QueueSender::depth).unwrap_or(0)
    }

    pub fn worker_stats(&self, lane: Lane) -> WorkerStats {
        match lane {
            Lane::Ordered => self.ordered_worker.stats(),
            Lane::FastPath => self.fast_worker.stats(),
        }
    }

    /// Closes both queues, drains them and joins the workers. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        let backlog = self.queue_depth(Lane::Ordered) + self.queue_depth(Lane::FastPath);
        if backlog > 0 {
            info!("Shutting down with {} queued command(s) left to drain", backlog);
        }

        self.ordered.take();
        self.fast.take();
        self.ordered_worker.join();
        self.fast_worker.join();

        runtime.shutdown_timeout(Duration::from_millis(self.config.shutdown_grace_ms));
        info!("Dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn build_runtime(config: &DispatcherConfig) -> Result<Runtime, DispatchError> {
    let threads = config.runtime_threads.max(1);
    if threads != config.runtime_threads {
        warn!("runtime_threads must be at least 1, using {}", threads);
    }
    Ok(Builder::new_multi_thread()
        .worker_threads(threads)
        .thread_name("ble-dispatch-io")
        .enable_all()
        .build()?)
}

fn parse_target(
    address: &str,
    service: &str,
    characteristic: &str,
) -> Result<(String, Uuid, Uuid), DispatchError> {
    Ok((
        parse_address(address)?,
        parse_uuid(service)?,
        parse_uuid(characteristic)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::simulation_config::SimulationConfig;
    use crate::core::bluetooth::SimulatedTransport;

    fn dispatcher() -> Dispatcher {
        let transport = Arc::new(SimulatedTransport::new(SimulationConfig {
            connect_delay_ms: 0,
            ..SimulationConfig::default()
        }));
        Dispatcher::with_transport(DispatcherConfig::default(), transport).unwrap()
    }

    #[test]
    fn test_malformed_input_is_rejected_before_enqueue() {
        let dispatcher = dispatcher();

        assert!(dispatcher.connect("not-an-address").unwrap_err().is_malformed_input());
        assert!(
            dispatcher
                .write_hex("AA:BB:CC:DD:EE:FF", "180D", "2A37", "010", true)
                .unwrap_err()
                .is_malformed_input()
        );
        assert!(
            dispatcher
                .write("AA:BB:CC:DD:EE:FF", "xyz", "2A37", &[1], false)
                .unwrap_err()
                .is_malformed_input()
        );
        assert!(dispatcher.set_mtu("AA:BB:CC:DD:EE:FF", 22).unwrap_err().is_malformed_input());
        assert!(dispatcher.set_mtu("AA:BB:CC:DD:EE:FF", 518).unwrap_err().is_malformed_input());
        assert!(dispatcher.set_mtu("AA:BB:CC:DD:EE:FF", -1).unwrap_err().is_malformed_input());

        assert_eq!(dispatcher.worker_stats(Lane::Ordered).executed, 0);
        assert_eq!(dispatcher.worker_stats(Lane::FastPath).executed, 0);
    }

    #[test]
    fn test_inline_operations() {
        let dispatcher = dispatcher();
        assert_eq!(dispatcher.backend(), Backend::Simulation);
        assert_eq!(dispatcher.query_rssi("aa:bb:cc:dd:ee:ff").unwrap(), -55);
        assert!(dispatcher.set_mtu("AA:BB:CC:DD:EE:FF", 247).unwrap());
        assert_eq!(dispatcher.queue_depth(Lane::Ordered), 0);
    }

    #[test]
    fn test_scan_fills_cache() {
        let dispatcher = dispatcher();
        assert!(dispatcher.get_scan_results(10).is_empty());

        assert_eq!(dispatcher.scan(Duration::from_millis(1000)).unwrap(), 2);
        let results = dispatcher.get_scan_results(10);
        assert_eq!(results.len(), 2);
        assert_eq!(dispatcher.get_scan_results(1).len(), 1);
    }

    #[test]
    fn test_shutdown_rejects_new_commands() {
        let mut dispatcher = dispatcher();
        dispatcher.shutdown();
        dispatcher.shutdown();

        assert!(matches!(
            dispatcher.connect("AA:BB:CC:DD:EE:FF"),
            Err(DispatchError::QueueClosed(Lane::Ordered))
        ));
        assert!(matches!(
            dispatcher.write("AA:BB:CC:DD:EE:FF", "180D", "2A37", &[1], true),
            Err(DispatchError::QueueClosed(Lane::FastPath))
        ));
        assert!(dispatcher.query_rssi("AA:BB:CC:DD:EE:FF").is_err());
    }

    #[test]
    fn test_read_returns_written_value() {
        let dispatcher = dispatcher();
        dispatcher
            .write_hex("AA:BB:CC:DD:EE:FF", "180D", "2A37", "0304", false)
            .unwrap();
        let value = dispatcher
            .read("AA:BB:CC:DD:EE:FF", "180D", "2A37")
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(value, Some(vec![0x03, 0x04]));
    }
}
