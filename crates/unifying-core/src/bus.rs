//! Bus metadata and receiver enumeration.
//!
//! A hidraw node does not know its own physical location or the revision of
//! the USB device it belongs to. [`SysfsBus`] walks sysfs from the node up to
//! the USB parent to find both; [`list_receivers`] enumerates receivers
//! directly over USB with nusb.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use nusb::{MaybeFuture, list_devices};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::identity::{BootloaderVariant, parse_revision, resolve_bootloader_variant};
use crate::protocol::constants::*;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Device path {0} has no file name")]
    InvalidPath(String),

    #[error("No USB parent with a revision above {0}")]
    NoUsbParent(String),

    #[error("USB enumeration failed: {0}")]
    Usb(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bus-side facts about a device node.
pub trait BusMetadata: Send + Sync {
    /// Stable physical location, e.g. `DEVPATH=/devices/pci0000:00/.../1-1`.
    fn physical_id(&self) -> Result<String, BusError>;

    /// Hexadecimal `bcdDevice` of the USB parent, if it can be read.
    fn parent_revision(&self) -> Option<String>;
}

/// Bus metadata resolved through sysfs.
#[derive(Debug, Clone)]
pub struct SysfsBus {
    root: PathBuf,
    node: String,
}

impl SysfsBus {
    /// Metadata for a device node such as `/dev/hidraw3`.
    pub fn new(device_path: &Path) -> Result<Self, BusError> {
        Self::with_root("/sys", device_path)
    }

    /// Like [`SysfsBus::new`] with sysfs mounted at `root`.
    pub fn with_root(root: impl Into<PathBuf>, device_path: &Path) -> Result<Self, BusError> {
        let node = device_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BusError::InvalidPath(device_path.display().to_string()))?;
        Ok(Self {
            root: root.into(),
            node: node.to_string(),
        })
    }

    /// Directory of the USB device the node hangs off (the one with `bcdDevice`).
    /// Returns the canonical sysfs root alongside the parent directory.
    fn usb_parent(&self) -> Result<(PathBuf, PathBuf), BusError> {
        let root = fs::canonicalize(&self.root)?;
        let device = root.join("class/hidraw").join(&self.node).join("device");
        let resolved = fs::canonicalize(&device)?;
        let parent = resolved
            .ancestors()
            .take_while(|dir| dir.starts_with(&root) && *dir != root)
            .find(|dir| dir.join("bcdDevice").is_file())
            .map(Path::to_path_buf)
            .ok_or_else(|| BusError::NoUsbParent(resolved.display().to_string()))?;
        Ok((root, parent))
    }
}

impl BusMetadata for SysfsBus {
    fn physical_id(&self) -> Result<String, BusError> {
        let (root, parent) = self.usb_parent()?;
        let devpath = parent.strip_prefix(&root).unwrap_or(&parent);
        Ok(format!("DEVPATH=/{}", devpath.display()))
    }

    fn parent_revision(&self) -> Option<String> {
        let (_, parent) = self.usb_parent().ok()?;
        match fs::read_to_string(parent.join("bcdDevice")) {
            Ok(s) => Some(s.trim().to_string()),
            Err(e) => {
                debug!(error = %e, "Failed to read bcdDevice");
                None
            }
        }
    }
}

/// Fixed metadata, for callers that already know where the device lives.
#[derive(Debug, Clone, Default)]
pub struct StaticBus {
    pub physical_id: String,
    pub revision: Option<String>,
}

impl StaticBus {
    pub fn new(physical_id: impl Into<String>, revision: Option<&str>) -> Self {
        Self {
            physical_id: physical_id.into(),
            revision: revision.map(str::to_string),
        }
    }
}

impl BusMetadata for StaticBus {
    fn physical_id(&self) -> Result<String, BusError> {
        Ok(self.physical_id.clone())
    }

    fn parent_revision(&self) -> Option<String> {
        self.revision.clone()
    }
}

/// What a receiver is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverMode {
    Runtime,
    Bootloader(BootloaderVariant),
}

impl fmt::Display for ReceiverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverMode::Runtime => write!(f, "runtime"),
            ReceiverMode::Bootloader(v) => write!(f, "bootloader ({})", v),
        }
    }
}

/// Classify a USB id pair as a Unifying receiver.
pub fn receiver_mode(vendor_id: u16, product_id: u16) -> Option<ReceiverMode> {
    if vendor_id != LOGITECH_VENDOR_ID {
        return None;
    }
    match product_id {
        PID_RUNTIME | PID_RUNTIME_PICO => Some(ReceiverMode::Runtime),
        PID_BOOTLOADER_NORDIC | PID_BOOTLOADER_NORDIC_PICO => {
            Some(ReceiverMode::Bootloader(BootloaderVariant::Nordic))
        }
        PID_BOOTLOADER_TEXAS | PID_BOOTLOADER_TEXAS_PICO => {
            Some(ReceiverMode::Bootloader(BootloaderVariant::Texas))
        }
        _ => None,
    }
}

/// A receiver found on the USB bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub mode: ReceiverMode,
    /// `bcdDevice`.
    pub revision: u16,
    pub bus_id: String,
    pub port_chain: Vec<u8>,
    pub product: Option<String>,
}

impl ReceiverInfo {
    /// Bootloader family implied by the revision (runtime mode only).
    pub fn bootloader_variant(&self) -> Option<BootloaderVariant> {
        match self.mode {
            ReceiverMode::Runtime => resolve_bootloader_variant(self.revision),
            ReceiverMode::Bootloader(v) => Some(v),
        }
    }

    /// Bus location as `<bus>-<port>.<port>...`.
    pub fn location(&self) -> String {
        let ports: Vec<String> = self.port_chain.iter().map(u8::to_string).collect();
        format!("{}-{}", self.bus_id, ports.join("."))
    }
}

impl fmt::Display for ReceiverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} rev {:04x} at {} [{}]",
            self.vendor_id,
            self.product_id,
            self.revision,
            self.location(),
            self.mode
        )?;
        if let Some(product) = &self.product {
            write!(f, " {}", product)?;
        }
        Ok(())
    }
}

/// Enumerate Unifying receivers currently attached over USB.
#[instrument(level = "debug")]
pub fn list_receivers() -> Result<Vec<ReceiverInfo>, BusError> {
    let devices = list_devices()
        .wait()
        .map_err(|e| BusError::Usb(e.to_string()))?;

    let receivers: Vec<ReceiverInfo> = devices
        .filter_map(|d| {
            let mode = receiver_mode(d.vendor_id(), d.product_id())?;
            Some(ReceiverInfo {
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
                mode,
                revision: d.device_version(),
                bus_id: d.bus_id().to_string(),
                port_chain: d.port_chain().to_vec(),
                product: d.product_string().map(str::to_string),
            })
        })
        .collect();

    debug!(count = receivers.len(), "Enumerated receivers");
    Ok(receivers)
}

/// Bootloader family from bus metadata; unknown or missing revisions yield `None`.
pub fn probe_variant(bus: &dyn BusMetadata) -> Option<BootloaderVariant> {
    let revision = bus.parent_revision()?;
    match parse_revision(&revision) {
        Some(code) => resolve_bootloader_variant(code),
        None => {
            debug!(revision = %revision, "Unparseable revision");
            None
        }
    }
}
