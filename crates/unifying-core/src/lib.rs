//! Unifying-Core: Logitech Unifying receiver driver in Rust.
//!
//! This crate talks HID++ 1.0 to a Unifying receiver in runtime mode,
//! reads its identity, watches for paired-device notifications and can
//! switch it into its bootloader for a firmware update.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Constants, frame codec, error replies
//! - **Transport**: hidraw I/O, transfers, background polling (hidraw, mock)
//! - **State**: Lifecycle state, setup retry, notification handlers
//! - **Identity**: Version strings, bootloader variant, GUIDs
//! - **Bus**: sysfs metadata and USB enumeration
//! - **Device**: The lifecycle orchestrator
//!
//! # Example
//!
//! ```no_run
//! use unifying_core::{DriverConfig, UnifyingDevice};
//!
//! let mut device = UnifyingDevice::hidraw("/dev/hidraw0", DriverConfig::default())?;
//! device.probe()?;
//! device.open()?;
//! device.setup()?;
//! println!("{}", device);
//! device.close()?;
//! # Ok::<(), unifying_core::DeviceError>(())
//! ```

pub mod bus;
pub mod config;
pub mod device;
pub mod events;
pub mod identity;
pub mod protocol;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use bus::{
    BusError, BusMetadata, ReceiverInfo, ReceiverMode, StaticBus, SysfsBus, list_receivers,
};
pub use config::DriverConfig;
pub use device::{DeviceError, UnifyingDevice};
pub use events::DeviceEvent;
pub use identity::{
    BootloaderVariant, DeviceIdentity, expects_signed_firmware, format_version,
    resolve_bootloader_variant,
};
pub use protocol::{CodecError, Message, MessageFlags, ProtocolError, ReportKind};
pub use state::{DeviceFlags, LifecycleState};
pub use transport::{HidTransport, HidrawTransport, MockTransport, TransportError};
