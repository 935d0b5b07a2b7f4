//! Unifying receiver in runtime mode.
//!
//! [`UnifyingDevice`] drives the lifecycle
//! `probe -> open -> setup -> detach -> close` over one transport handle.
//! While open, a poll thread reads unsolicited reports and pushes the
//! interesting ones onto an event channel that the owner drains.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::bus::{BusError, BusMetadata, SysfsBus, probe_variant};
use crate::config::DriverConfig;
use crate::events::DeviceEvent;
use crate::identity::{BootloaderVariant, DeviceIdentity};
use crate::protocol::Message;
use crate::protocol::constants::HIDPP_VERSION_1;
use crate::state::retry::{Delay, RetryError, RetryPolicy, ThreadDelay, retry};
use crate::state::{DeviceFlags, LifecycleContext, LifecycleState, handle_notification, runtime};
use crate::transport::poll::lock_transport;
use crate::transport::{
    HidTransport, HidrawTransport, PollHandle, PollOutcome, SharedTransport, TransportError,
    TransportOpener, poll_once, schedule_polling,
};

pub const DEVICE_NAME: &str = "Unifying Receiver";
pub const DEVICE_SUMMARY: &str = "A miniaturised USB wireless receiver";

/// Events held for the owner before new ones are dropped.
pub const EVENT_QUEUE_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error("Setup failed after {attempts} attempts")]
    SetupExhausted {
        attempts: u32,
        #[source]
        last: TransportError,
    },
}

impl DeviceError {
    /// The transport error behind this failure, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            DeviceError::Transport(e) => Some(e),
            DeviceError::SetupExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}

/// A runtime-mode receiver bound to one device node.
pub struct UnifyingDevice<T: HidTransport + 'static> {
    config: DriverConfig,
    path: PathBuf,
    bus: Box<dyn BusMetadata>,
    opener: Box<dyn TransportOpener<T>>,
    delay: Box<dyn Delay>,
    ctx: LifecycleContext,
    physical_id: Option<String>,
    variant: Option<BootloaderVariant>,
    transport: SharedTransport<T>,
    poll: Option<PollHandle>,
    identity: Option<Arc<DeviceIdentity>>,
    events_tx: Option<Sender<DeviceEvent>>,
    events_rx: Receiver<DeviceEvent>,
}

impl UnifyingDevice<HidrawTransport> {
    /// Receiver behind a hidraw node, with bus metadata from sysfs.
    pub fn hidraw(path: impl Into<PathBuf>, config: DriverConfig) -> Result<Self, DeviceError> {
        let path = path.into();
        let bus = SysfsBus::new(&path)?;
        Ok(Self::new(
            path,
            config,
            Box::new(bus),
            Box::new(HidrawTransport::open),
        ))
    }
}

impl<T: HidTransport + 'static> UnifyingDevice<T> {
    pub fn new(
        path: impl Into<PathBuf>,
        config: DriverConfig,
        bus: Box<dyn BusMetadata>,
        opener: Box<dyn TransportOpener<T>>,
    ) -> Self {
        let (_, events_rx) = channel::bounded(EVENT_QUEUE_LEN);
        Self {
            config,
            path: path.into(),
            bus,
            opener,
            delay: Box::new(ThreadDelay),
            ctx: LifecycleContext::new(),
            physical_id: None,
            variant: None,
            transport: Arc::new(Mutex::new(None)),
            poll: None,
            identity: None,
            events_tx: None,
            events_rx,
        }
    }

    /// Replace the clock used between setup attempts.
    pub fn with_delay(mut self, delay: Box<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    fn require(&self, operation: &'static str, state: LifecycleState) -> Result<(), DeviceError> {
        if self.ctx.state != state {
            return Err(DeviceError::InvalidState {
                operation,
                state: self.ctx.state,
            });
        }
        Ok(())
    }

    /// Resolve the physical ID and the bootloader family from bus metadata.
    ///
    /// An unknown parent revision leaves the variant unset and is not an error.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn probe(&mut self) -> Result<(), DeviceError> {
        self.require("probe", LifecycleState::Closed)?;

        self.physical_id = Some(self.bus.physical_id()?);
        self.variant = probe_variant(self.bus.as_ref());
        info!(
            physical_id = self.physical_id.as_deref().unwrap_or_default(),
            variant = ?self.variant,
            "Probed receiver"
        );
        Ok(())
    }

    /// Acquire the transport handle and start polling.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn open(&mut self) -> Result<(), DeviceError> {
        self.require("open", LifecycleState::Closed)?;

        let transport = self.opener.open(&self.path)?;
        *lock_transport(&self.transport) = Some(transport);
        self.identity = None;

        if self.poll.is_none() {
            let (tx, rx) = channel::bounded(EVENT_QUEUE_LEN);
            let poll_tx = tx.clone();
            let started = schedule_polling(
                Arc::clone(&self.transport),
                self.config.poll_interval(),
                HIDPP_VERSION_1,
                self.config.poll_timeout_ms,
                move |msg| push_event(&poll_tx, &msg),
            );
            match started {
                Ok(handle) => {
                    self.poll = Some(handle);
                    self.events_tx = Some(tx);
                    self.events_rx = rx;
                }
                Err(e) => {
                    let _ = self.release_transport();
                    return Err(TransportError::Io(e).into());
                }
            }
        }

        self.ctx.goto_state(LifecycleState::Open);
        Ok(())
    }

    /// Read the receiver identity and enable notifications.
    ///
    /// Retried while the receiver answers with "invalid data", which happens
    /// when another party is still talking to it early in boot.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn setup(&mut self) -> Result<(), DeviceError> {
        self.require("setup", LifecycleState::Open)?;

        let policy = RetryPolicy {
            attempts: self.config.setup_attempts,
            delay: self.config.setup_retry_delay(),
        };
        let variant = self.variant;
        let timeout_ms = self.config.transfer_timeout_ms;
        let transport = &self.transport;

        let result = retry(
            policy,
            self.delay.as_ref(),
            TransportError::is_invalid_data,
            |attempt| {
                debug!(attempt, "Setup attempt");
                let mut guard = lock_transport(transport);
                let t = guard.as_mut().ok_or(TransportError::NotOpen)?;
                runtime::setup_once(t, variant, timeout_ms)
            },
        );

        match result {
            Ok(identity) => {
                info!(version = %identity.version, "Receiver ready");
                self.identity = Some(Arc::new(identity));
                self.ctx.goto_state(LifecycleState::Ready);
                Ok(())
            }
            Err(RetryError::Aborted { error, .. }) => Err(error.into()),
            Err(RetryError::Exhausted { attempts, last }) => {
                Err(DeviceError::SetupExhausted { attempts, last })
            }
        }
    }

    /// Switch the receiver into its bootloader.
    ///
    /// On success the receiver re-enumerates under a bootloader product id,
    /// so the caller has to wait for it to come back.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn detach(&mut self) -> Result<(), DeviceError> {
        self.require("detach", LifecycleState::Ready)?;

        {
            let mut guard = lock_transport(&self.transport);
            let t = guard.as_mut().ok_or(TransportError::NotOpen)?;
            runtime::send_detach(t, self.config.transfer_timeout_ms)?;
        }

        self.ctx.flags.insert(DeviceFlags::WAIT_FOR_REPLUG);
        self.ctx.goto_state(LifecycleState::Detached);
        Ok(())
    }

    /// Stop polling and release the handle. Closing a closed device is a no-op.
    ///
    /// The device ends up closed even when the OS reports a close failure;
    /// that failure is still returned.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn close(&mut self) -> Result<(), DeviceError> {
        if let Some(mut poll) = self.poll.take() {
            poll.cancel();
        }
        self.events_tx = None;

        let result = self.release_transport();
        if self.ctx.state != LifecycleState::Closed {
            self.ctx.goto_state(LifecycleState::Closed);
        }
        result.map_err(DeviceError::from)
    }

    fn release_transport(&mut self) -> Result<(), TransportError> {
        let Some(mut transport) = lock_transport(&self.transport).take() else {
            return Ok(());
        };
        transport.close().inspect_err(|e| {
            warn!(error = %e, "Failed to close device");
        })
    }

    /// Run one poll tick now instead of waiting for the timer.
    pub fn poll_now(&self) -> PollOutcome {
        let Some(tx) = &self.events_tx else {
            return PollOutcome::Closed;
        };
        poll_once(
            &self.transport,
            HIDPP_VERSION_1,
            self.config.poll_timeout_ms,
            &mut |msg| push_event(tx, &msg),
        )
    }

    /// Event stream. Disconnects once the device is closed and drained.
    pub fn events(&self) -> &Receiver<DeviceEvent> {
        &self.events_rx
    }

    /// Take every event queued so far.
    pub fn drain_events(&self) -> Vec<DeviceEvent> {
        self.events_rx.try_iter().collect()
    }

    pub fn state(&self) -> LifecycleState {
        self.ctx.state
    }

    pub fn flags(&self) -> DeviceFlags {
        self.ctx.flags
    }

    pub fn identity(&self) -> Option<Arc<DeviceIdentity>> {
        self.identity.clone()
    }

    pub fn physical_id(&self) -> Option<&str> {
        self.physical_id.as_deref()
    }

    pub fn bootloader_variant(&self) -> Option<BootloaderVariant> {
        self.variant
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().is_some_and(PollHandle::is_active)
    }
}

/// Classify a polled message and queue its event, dropping it if the owner
/// has fallen behind.
fn push_event(tx: &Sender<DeviceEvent>, msg: &Message) {
    let Some(event) = handle_notification(msg) else {
        return;
    };
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!(event = %event, "Event queue full, dropping event");
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

impl<T: HidTransport + 'static> Drop for UnifyingDevice<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl<T: HidTransport + 'static> fmt::Display for UnifyingDevice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handle_open = lock_transport(&self.transport)
            .as_ref()
            .is_some_and(|t| t.is_open());
        let flags: Vec<String> = self
            .ctx
            .flags
            .iter_names()
            .map(|(name, _)| name.to_lowercase())
            .collect();

        writeln!(f, "{}", DEVICE_NAME)?;
        writeln!(f, "  Summary:\t\t{}", DEVICE_SUMMARY)?;
        writeln!(f, "  Path:\t\t\t{}", self.path.display())?;
        if let Some(id) = &self.physical_id {
            writeln!(f, "  PhysicalId:\t\t{}", id)?;
        }
        writeln!(f, "  State:\t\t{}", self.ctx.state)?;
        writeln!(f, "  HandleOpen:\t\t{}", handle_open)?;
        writeln!(f, "  Flags:\t\t{}", flags.join("|"))?;
        if let Some(variant) = self.variant {
            writeln!(f, "  Bootloader:\t\t{}", variant)?;
        }
        if let Some(identity) = &self.identity {
            writeln!(f, "{}", identity)?;
        }
        write!(f, "  AgentVersion:\t\t{}", self.config.agent_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::StaticBus;
    use crate::state::NoDelay;
    use crate::transport::MockTransport;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const INVALID_VALUE_REPLY: [u8; 7] = [0x10, 0xFF, 0x8F, 0x81, 0xF1, 0x03, 0x00];
    const BUSY_REPLY: [u8; 7] = [0x10, 0xFF, 0x8F, 0x81, 0xF1, 0x07, 0x00];

    #[derive(Clone, Default)]
    struct CountingDelay(Arc<AtomicU32>);

    impl Delay for CountingDelay {
        fn sleep(&self, _duration: Duration) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_config() -> DriverConfig {
        DriverConfig {
            // Keep the background thread out of the way of queued replies.
            poll_interval_secs: 3600,
            agent_version: "test".into(),
            ..Default::default()
        }
    }

    fn device_with(mock: &MockTransport, revision: Option<&str>) -> UnifyingDevice<MockTransport> {
        let mock = mock.clone();
        let opener = move |_: &Path| -> Result<MockTransport, TransportError> { Ok(mock.clone()) };
        UnifyingDevice::new(
            "/dev/hidraw0",
            test_config(),
            Box::new(StaticBus::new("DEVPATH=/devices/usb1/1-1", revision)),
            Box::new(opener),
        )
        .with_delay(Box::new(NoDelay))
    }

    fn queue_firmware_info(mock: &MockTransport) {
        mock.queue_frame(&[0x10, 0xFF, 0x81, 0xF1, 0x01, 0x12, 0x03]);
        mock.queue_frame(&[0x10, 0xFF, 0x81, 0xF1, 0x02, 0x00, 0x41]);
        mock.queue_frame(&[0x10, 0xFF, 0x81, 0xF1, 0x04, 0x04, 0x08]);
        mock.queue_frame(&[0x10, 0xFF, 0x80, 0x00, 0x00, 0x00, 0x00]);
    }

    fn ready_device(mock: &MockTransport) -> UnifyingDevice<MockTransport> {
        let mut device = device_with(mock, Some("1201"));
        device.probe().unwrap();
        device.open().unwrap();
        queue_firmware_info(mock);
        device.setup().unwrap();
        mock.clear_writes();
        device
    }

    #[test]
    fn test_probe_resolves_variant() {
        let mock = MockTransport::new();
        for (revision, expected) in [
            ("1234", Some(BootloaderVariant::Nordic)),
            ("2434", Some(BootloaderVariant::Texas)),
            ("FFFF", None),
            ("3301", None),
        ] {
            let mut device = device_with(&mock, Some(revision));
            device.probe().unwrap();
            assert_eq!(device.bootloader_variant(), expected, "revision {revision}");
            assert_eq!(device.physical_id(), Some("DEVPATH=/devices/usb1/1-1"));
            assert_eq!(device.state(), LifecycleState::Closed);
        }
    }

    #[test]
    fn test_open_and_setup() {
        let mock = MockTransport::new();
        let mut device = device_with(&mock, Some("1201"));
        device.probe().unwrap();
        device.open().unwrap();
        assert_eq!(device.state(), LifecycleState::Open);
        assert!(device.is_polling());

        queue_firmware_info(&mock);
        device.setup().unwrap();
        assert_eq!(device.state(), LifecycleState::Ready);

        let identity = device.identity().unwrap();
        assert_eq!(identity.version, "RQR18.03_B0065");
        assert_eq!(identity.version_bootloader.as_deref(), Some("BOT01.04_B0008"));
        assert!(identity.signed_firmware);
        assert_eq!(mock.get_writes().len(), 4);
    }

    #[test]
    fn test_open_failure_stays_closed() {
        let opener = |path: &Path| -> Result<MockTransport, TransportError> {
            Err(TransportError::DeviceUnavailable {
                path: path.display().to_string(),
                message: "No such file or directory".into(),
            })
        };
        let mut device: UnifyingDevice<MockTransport> = UnifyingDevice::new(
            "/dev/hidraw7",
            test_config(),
            Box::new(StaticBus::default()),
            Box::new(opener),
        );
        let err = device.open().unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Transport(TransportError::DeviceUnavailable { .. })
        ));
        assert_eq!(device.state(), LifecycleState::Closed);
        assert!(!device.is_polling());
    }

    #[test]
    fn test_setup_retries_invalid_data() {
        let mock = MockTransport::new();
        let delay = CountingDelay::default();
        let mut device = device_with(&mock, Some("1201")).with_delay(Box::new(delay.clone()));
        device.open().unwrap();

        for _ in 0..4 {
            mock.queue_frame(&INVALID_VALUE_REPLY);
        }
        queue_firmware_info(&mock);

        device.setup().unwrap();
        assert_eq!(device.state(), LifecycleState::Ready);
        assert_eq!(delay.0.load(Ordering::SeqCst), 5);
        // Four failed first reads, then three reads and the notification enable.
        assert_eq!(mock.get_writes().len(), 8);
    }

    #[test]
    fn test_setup_aborts_on_other_errors() {
        let mock = MockTransport::new();
        let delay = CountingDelay::default();
        let mut device = device_with(&mock, None).with_delay(Box::new(delay.clone()));
        device.open().unwrap();

        mock.queue_frame(&BUSY_REPLY);
        queue_firmware_info(&mock);

        let err = device.setup().unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Transport(TransportError::Protocol(_))
        ));
        assert_eq!(delay.0.load(Ordering::SeqCst), 1);
        assert_eq!(mock.get_writes().len(), 1);
        assert_eq!(device.state(), LifecycleState::Open);
        assert!(device.identity().is_none());
    }

    #[test]
    fn test_setup_exhausted() {
        let mock = MockTransport::new();
        let mut device = device_with(&mock, None);
        device.open().unwrap();

        for _ in 0..5 {
            mock.queue_frame(&INVALID_VALUE_REPLY);
        }

        match device.setup() {
            Err(DeviceError::SetupExhausted { attempts, last }) => {
                assert_eq!(attempts, 5);
                assert!(last.is_invalid_data());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(device.state(), LifecycleState::Open);
    }

    #[test]
    fn test_setup_requires_open() {
        let mock = MockTransport::new();
        let mut device = device_with(&mock, None);
        assert!(matches!(
            device.setup(),
            Err(DeviceError::InvalidState {
                operation: "setup",
                state: LifecycleState::Closed
            })
        ));
    }

    #[test]
    fn test_detach_success() {
        let mock = MockTransport::new();
        let mut device = ready_device(&mock);

        device.detach().unwrap();
        assert_eq!(device.state(), LifecycleState::Detached);
        assert!(device.flags().contains(DeviceFlags::WAIT_FOR_REPLUG));
        assert_eq!(
            mock.get_writes(),
            vec![vec![0x10, 0xFF, 0x80, 0xF0, b'I', b'C', b'P']]
        );
    }

    #[test]
    fn test_detach_failure_stays_ready() {
        let mock = MockTransport::new();
        let mut device = ready_device(&mock);

        mock.fail_next_write(std::io::ErrorKind::BrokenPipe);
        assert!(device.detach().is_err());
        assert_eq!(device.state(), LifecycleState::Ready);
        assert!(!device.flags().contains(DeviceFlags::WAIT_FOR_REPLUG));
    }

    #[test]
    fn test_close_twice_is_noop() {
        let mock = MockTransport::new();
        let mut device = ready_device(&mock);

        device.close().unwrap();
        assert_eq!(device.state(), LifecycleState::Closed);
        assert!(!device.is_polling());
        device.close().unwrap();
        assert_eq!(mock.close_count(), 1);
    }

    #[test]
    fn test_poll_events() {
        let mock = MockTransport::new();
        let device = ready_device(&mock);

        assert_eq!(device.poll_now(), PollOutcome::Idle);
        assert!(device.drain_events().is_empty());

        mock.queue_frame(&[0x10, 0x01, 0x41, 0x04, 0x61, 0x2B, 0x40]);
        assert_eq!(device.poll_now(), PollOutcome::Delivered);
        let events = device.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].device_index(), 0x01);
        assert_eq!(device.state(), LifecycleState::Ready);

        mock.queue_frame(&[0x10, 0x01, 0x49, 0x00, 0x20, 0x00, 0x00]);
        assert_eq!(device.poll_now(), PollOutcome::Delivered);
        assert!(device.drain_events().is_empty());
    }

    #[test]
    fn test_events_disconnect_after_close() {
        let mock = MockTransport::new();
        let mut device = ready_device(&mock);
        mock.queue_frame(&[0x10, 0x02, 0x40, 0x02, 0x00, 0x00, 0x00]);
        device.poll_now();

        device.close().unwrap();
        assert_eq!(device.poll_now(), PollOutcome::Closed);
        let events = device.events();
        assert!(events.recv().is_ok());
        assert!(events.recv().is_err());
    }

    #[test]
    fn test_reopen_forgets_identity() {
        let mock = MockTransport::new();
        let mut device = ready_device(&mock);
        assert!(device.identity().is_some());

        device.close().unwrap();
        mock.reopen();
        device.open().unwrap();
        assert!(device.identity().is_none());

        mock.queue_frame(&BUSY_REPLY);
        assert!(device.setup().is_err());
        assert_eq!(device.state(), LifecycleState::Open);
        assert!(device.identity().is_none());
        assert!(!device.to_string().contains("  Version:\t"));
    }

    #[test]
    fn test_event_queue_is_bounded() {
        let mock = MockTransport::new();
        let device = ready_device(&mock);

        for _ in 0..EVENT_QUEUE_LEN + 8 {
            mock.queue_frame(&[0x10, 0x02, 0x40, 0x02, 0x00, 0x00, 0x00]);
            assert_eq!(device.poll_now(), PollOutcome::Delivered);
        }
        assert_eq!(device.drain_events().len(), EVENT_QUEUE_LEN);

        mock.queue_frame(&[0x10, 0x02, 0x40, 0x02, 0x00, 0x00, 0x00]);
        device.poll_now();
        assert_eq!(device.drain_events().len(), 1);
    }

    #[test]
    fn test_description() {
        let mock = MockTransport::new();
        let device = ready_device(&mock);
        let text = device.to_string();
        assert!(text.starts_with("Unifying Receiver\n"));
        assert!(text.contains("State:\t\tREADY"));
        assert!(text.contains("HandleOpen:\t\ttrue"));
        assert!(text.contains("Flags:\t\tupdatable"));
        assert!(text.contains("SignedFirmware:\ttrue"));
        assert!(text.contains("AgentVersion:\t\ttest"));
    }
}
