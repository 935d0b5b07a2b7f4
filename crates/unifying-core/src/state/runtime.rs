//! Register operations for a runtime-mode receiver.

use tracing::{debug, warn};

use crate::identity::{BootloaderVariant, DeviceIdentity, FIRMWARE_INFO_LEN};
use crate::protocol::constants::*;
use crate::protocol::{Message, MessageFlags};
use crate::transport::{HidTransport, TransportError};

/// Firmware information indices read during setup.
///
/// Index 0x03 (MCU1 hardware version) is skipped: firmware 12.01 answers it
/// with INVALID_VALUE.
pub const FIRMWARE_INFO_INDICES: [u8; 3] = [0x01, 0x02, 0x04];

/// Read the firmware information register into a ten byte block.
///
/// Index `i` fills bytes `2i..2i + 2` from reply payload bytes 1 and 2.
pub fn read_firmware_info<T: HidTransport + ?Sized>(
    transport: &mut T,
    timeout_ms: u64,
) -> Result<[u8; FIRMWARE_INFO_LEN], TransportError> {
    let mut info = [0u8; FIRMWARE_INFO_LEN];
    for index in FIRMWARE_INFO_INDICES {
        let mut msg = Message::short(
            DEVICE_INDEX_RECEIVER,
            SUBID_GET_REGISTER,
            REGISTER_DEVICE_FIRMWARE_INFORMATION,
        )
        .with_payload(&[index]);
        if let Err(e) = transport.transfer(&mut msg, timeout_ms) {
            debug!(index, error = %e, "Failed to read device config");
            return Err(e);
        }
        let offset = usize::from(index) * 2;
        info[offset..offset + 2].copy_from_slice(&msg.data()[1..3]);
    }
    Ok(info)
}

/// Ask the receiver to report wireless and software-present notifications.
pub fn enable_notifications<T: HidTransport + ?Sized>(
    transport: &mut T,
    timeout_ms: u64,
) -> Result<(), TransportError> {
    let mut msg = Message::short(
        DEVICE_INDEX_RECEIVER,
        SUBID_SET_REGISTER,
        REGISTER_HIDPP_NOTIFICATIONS,
    )
    .with_payload(&[0x00, NOTIFICATIONS_WIRELESS_SOFTWARE_PRESENT, 0x00]);
    transport.transfer(&mut msg, timeout_ms)
}

/// One setup attempt: read the identity, then enable notifications.
///
/// A failure to enable notifications is logged and does not fail setup.
pub fn setup_once<T: HidTransport + ?Sized>(
    transport: &mut T,
    variant: Option<BootloaderVariant>,
    timeout_ms: u64,
) -> Result<DeviceIdentity, TransportError> {
    let info = read_firmware_info(transport, timeout_ms)?;
    let identity = DeviceIdentity::from_firmware_info(&info, variant);

    if let Err(e) = enable_notifications(transport, timeout_ms) {
        warn!(error = %e, "Failed to enable notifications");
    }
    Ok(identity)
}

/// The "enter update mode" command.
pub fn detach_message() -> Message {
    Message::short(
        DEVICE_INDEX_RECEIVER,
        SUBID_SET_REGISTER,
        REGISTER_DEVICE_FIRMWARE_UPDATE_MODE,
    )
    .with_payload(&DETACH_MAGIC)
    .with_flags(MessageFlags::LONGER_TIMEOUT)
}

/// Send the "enter update mode" command. No reply is expected since the
/// receiver drops off the bus.
pub fn send_detach<T: HidTransport + ?Sized>(
    transport: &mut T,
    timeout_ms: u64,
) -> Result<(), TransportError> {
    transport.send(&detach_message(), timeout_ms)
}
