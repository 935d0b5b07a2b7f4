//! Device identity and version derivation.
//!
//! Pure functions over bytes already read from the receiver and over bus
//! metadata; nothing here touches a transport.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use tracing::warn;
use uuid::Uuid;

use crate::protocol::constants::{
    LOGITECH_VENDOR_ID, PID_BOOTLOADER_NORDIC, PID_BOOTLOADER_TEXAS, PID_RUNTIME, REVISION_UNSET,
};

/// Role tag for application firmware versions.
pub const ROLE_RUNTIME: &str = "RQR";
/// Role tag for bootloader versions.
pub const ROLE_BOOTLOADER: &str = "BOT";

/// Size of the assembled firmware information block.
pub const FIRMWARE_INFO_LEN: usize = 10;

/// Format a version as `<role><major>.<minor>_B<build>`.
///
/// At most three role characters are used and whitespace in the role is
/// skipped.
pub fn format_version(role: &str, major: u8, minor: u8, build: u16) -> String {
    let mut out: String = role
        .chars()
        .take(3)
        .filter(|c| !c.is_whitespace())
        .collect();
    out.push_str(&format!("{:02}.{:02}_B{:04}", major, minor, build));
    out
}

/// Bootloader silicon family of a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootloaderVariant {
    Nordic,
    Texas,
}

impl BootloaderVariant {
    /// Bootloader major version implied by the family.
    pub const fn bootloader_major(self) -> u8 {
        match self {
            Self::Nordic => 0x01,
            Self::Texas => 0x03,
        }
    }

    /// First bootloader minor version that only accepts signed images.
    pub const fn min_signed_minor(self) -> u8 {
        match self {
            Self::Nordic => 0x04,
            Self::Texas => 0x02,
        }
    }

    /// USB product id the receiver re-enumerates with in bootloader mode.
    pub const fn bootloader_pid(self) -> u16 {
        match self {
            Self::Nordic => PID_BOOTLOADER_NORDIC,
            Self::Texas => PID_BOOTLOADER_TEXAS,
        }
    }

    /// Instance ID of the bootloader-mode counterpart.
    pub fn counterpart_instance_id(self) -> String {
        instance_id(LOGITECH_VENDOR_ID, self.bootloader_pid())
    }
}

impl fmt::Display for BootloaderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootloaderVariant::Nordic => write!(f, "Nordic"),
            BootloaderVariant::Texas => write!(f, "Texas"),
        }
    }
}

/// Map a parent USB revision (`bcdDevice`) to a bootloader family.
///
/// Only the high byte is significant. `0xFFFF` means "not reported" and
/// resolves quietly to `None`; any other unknown revision is logged.
pub fn resolve_bootloader_variant(revision: u16) -> Option<BootloaderVariant> {
    if revision == REVISION_UNSET {
        return None;
    }
    match revision & 0xFF00 {
        0x1200 => Some(BootloaderVariant::Nordic),
        0x2400 => Some(BootloaderVariant::Texas),
        _ => {
            warn!(revision = %format!("{:04x}", revision), "Bootloader release invalid");
            None
        }
    }
}

/// Parse a hexadecimal revision string such as udev's `ID_REVISION`.
pub fn parse_revision(s: &str) -> Option<u16> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(s, 16).ok()
}

/// Whether a bootloader at this version refuses unsigned firmware.
pub fn expects_signed_firmware(
    variant: BootloaderVariant,
    bootloader_major: u8,
    bootloader_minor: u8,
) -> bool {
    bootloader_major == variant.bootloader_major()
        && bootloader_minor >= variant.min_signed_minor()
}

/// `USB\VID_xxxx&PID_xxxx` instance ID.
pub fn instance_id(vid: u16, pid: u16) -> String {
    format!("USB\\VID_{:04X}&PID_{:04X}", vid, pid)
}

/// Stable GUID for an instance ID (UUID v5 in the DNS namespace).
pub fn guid_from_instance_id(instance_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, instance_id.as_bytes())
}

/// Identity of a runtime-mode receiver, frozen after setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub version: String,
    pub version_bootloader: Option<String>,
    pub bootloader_variant: Option<BootloaderVariant>,
    pub instance_id: String,
    pub guid: Uuid,
    pub counterpart_instance_id: Option<String>,
    pub counterpart_guid: Option<Uuid>,
    pub signed_firmware: bool,
}

impl DeviceIdentity {
    /// Build the identity from the firmware information block.
    ///
    /// `info[2..4]` holds the firmware major/minor, `info[4..6]` the
    /// big-endian build number and `info[8..10]` the bootloader minor and
    /// build.
    pub fn from_firmware_info(
        info: &[u8; FIRMWARE_INFO_LEN],
        variant: Option<BootloaderVariant>,
    ) -> Self {
        let version = format_version(
            ROLE_RUNTIME,
            info[2],
            info[3],
            BigEndian::read_u16(&info[4..6]),
        );

        let mut version_bootloader = None;
        let mut signed_firmware = false;
        if let Some(variant) = variant {
            let major = variant.bootloader_major();
            version_bootloader = Some(format_version(
                ROLE_BOOTLOADER,
                major,
                info[8],
                u16::from(info[9]),
            ));
            signed_firmware = expects_signed_firmware(variant, major, info[8]);
        }

        let instance_id = instance_id(LOGITECH_VENDOR_ID, PID_RUNTIME);
        let counterpart_instance_id = variant.map(BootloaderVariant::counterpart_instance_id);
        Self {
            version,
            version_bootloader,
            bootloader_variant: variant,
            guid: guid_from_instance_id(&instance_id),
            instance_id,
            counterpart_guid: counterpart_instance_id
                .as_deref()
                .map(guid_from_instance_id),
            counterpart_instance_id,
            signed_firmware,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Version:\t\t{}", self.version)?;
        if let Some(bl) = &self.version_bootloader {
            writeln!(f, "  VersionBootloader:\t{}", bl)?;
        }
        writeln!(f, "  Guid:\t\t\t{} <- {}", self.guid, self.instance_id)?;
        if let (Some(guid), Some(id)) = (&self.counterpart_guid, &self.counterpart_instance_id) {
            writeln!(f, "  CounterpartGuid:\t{} <- {}", guid, id)?;
        }
        write!(f, "  SignedFirmware:\t{}", self.signed_firmware)
    }
}
