//! HID++ constants for Logitech Unifying receivers.

// Report IDs
pub const REPORT_ID_SHORT: u8 = 0x10;
pub const REPORT_ID_LONG: u8 = 0x11;

// Frame geometry: [report id][device index][sub id][function id][payload..]
pub const HEADER_LEN: usize = 4;
pub const SHORT_FRAME_LEN: usize = 7;
pub const LONG_FRAME_LEN: usize = 20;
pub const SHORT_PAYLOAD_LEN: usize = SHORT_FRAME_LEN - HEADER_LEN;
pub const LONG_PAYLOAD_LEN: usize = LONG_FRAME_LEN - HEADER_LEN;

/// Largest read issued against the device node.
pub const MAX_READ_LEN: usize = 32;

// Device indices
pub const DEVICE_INDEX_WIRED: u8 = 0x00;
pub const DEVICE_INDEX_RECEIVER: u8 = 0xFF;

pub const HIDPP_VERSION_1: u8 = 1;
pub const HIDPP_VERSION_2: u8 = 2;

// Sub IDs
pub const SUBID_DEVICE_DISCONNECTION: u8 = 0x40;
pub const SUBID_DEVICE_CONNECTION: u8 = 0x41;
pub const SUBID_DEVICE_DISCOVERY: u8 = 0x42;
pub const SUBID_PIN_CODE_REQUEST: u8 = 0x43;
pub const SUBID_RECEIVER_WORKING_MODE: u8 = 0x44;
pub const SUBID_ERROR_MESSAGE: u8 = 0x45;
pub const SUBID_RF_LINK_CHANGE: u8 = 0x46;
pub const SUBID_LINK_QUALITY: u8 = 0x49;
pub const SUBID_DEVICE_LOCKING_CHANGED: u8 = 0x4A;
pub const SUBID_WIRELESS_DEVICE_CHANGE: u8 = 0x4B;
pub const SUBID_SET_REGISTER: u8 = 0x80;
pub const SUBID_GET_REGISTER: u8 = 0x81;
pub const SUBID_SET_LONG_REGISTER: u8 = 0x82;
pub const SUBID_GET_LONG_REGISTER: u8 = 0x83;
pub const SUBID_ERROR_MSG: u8 = 0x8F;
pub const SUBID_ERROR_MSG_20: u8 = 0xFF;

// Registers
pub const REGISTER_HIDPP_NOTIFICATIONS: u8 = 0x00;
pub const REGISTER_DEVICE_FIRMWARE_UPDATE_MODE: u8 = 0xF0;
pub const REGISTER_DEVICE_FIRMWARE_INFORMATION: u8 = 0xF1;

// HID++ 1.0 error codes
pub const HIDPP_ERR_SUCCESS: u8 = 0x00;
pub const HIDPP_ERR_INVALID_SUBID: u8 = 0x01;
pub const HIDPP_ERR_INVALID_ADDRESS: u8 = 0x02;
pub const HIDPP_ERR_INVALID_VALUE: u8 = 0x03;
pub const HIDPP_ERR_CONNECT_FAIL: u8 = 0x04;
pub const HIDPP_ERR_TOO_MANY_DEVICES: u8 = 0x05;
pub const HIDPP_ERR_ALREADY_EXISTS: u8 = 0x06;
pub const HIDPP_ERR_BUSY: u8 = 0x07;
pub const HIDPP_ERR_UNKNOWN_DEVICE: u8 = 0x08;
pub const HIDPP_ERR_RESOURCE_ERROR: u8 = 0x09;
pub const HIDPP_ERR_REQUEST_UNAVAILABLE: u8 = 0x0A;
pub const HIDPP_ERR_INVALID_PARAM_VALUE: u8 = 0x0B;
pub const HIDPP_ERR_WRONG_PIN_CODE: u8 = 0x0C;

// HID++ 2.0 error codes
pub const HIDPP_ERR20_NO_ERROR: u8 = 0x00;
pub const HIDPP_ERR20_UNKNOWN: u8 = 0x01;
pub const HIDPP_ERR20_INVALID_ARGUMENT: u8 = 0x02;
pub const HIDPP_ERR20_OUT_OF_RANGE: u8 = 0x03;
pub const HIDPP_ERR20_HARDWARE_ERROR: u8 = 0x04;
pub const HIDPP_ERR20_LOGITECH_INTERNAL: u8 = 0x05;
pub const HIDPP_ERR20_INVALID_FEATURE_INDEX: u8 = 0x06;
pub const HIDPP_ERR20_INVALID_FUNCTION_ID: u8 = 0x07;
pub const HIDPP_ERR20_BUSY: u8 = 0x08;
pub const HIDPP_ERR20_UNSUPPORTED: u8 = 0x09;

/// Notification flags written to `REGISTER_HIDPP_NOTIFICATIONS`: wireless + software present.
pub const NOTIFICATIONS_WIRELESS_SOFTWARE_PRESENT: u8 = 0x05;

/// Payload of the "enter update mode" command.
pub const DETACH_MAGIC: [u8; 3] = *b"ICP";

// Timeouts
pub const DEVICE_TIMEOUT_MS: u64 = 2500;
pub const POLL_TIMEOUT_MS: u64 = 1;
pub const LONGER_TIMEOUT_MULTIPLIER: u64 = 10;

/// Unrelated frames tolerated while waiting for a reply.
pub const MAX_IGNORED_MESSAGES: usize = 10;

// USB identity
pub const LOGITECH_VENDOR_ID: u16 = 0x046D;
pub const PID_RUNTIME: u16 = 0xC52B;
pub const PID_RUNTIME_PICO: u16 = 0xC532;
pub const PID_BOOTLOADER_NORDIC: u16 = 0xAAAA;
pub const PID_BOOTLOADER_NORDIC_PICO: u16 = 0xAAAE;
pub const PID_BOOTLOADER_TEXAS: u16 = 0xAAAC;
pub const PID_BOOTLOADER_TEXAS_PICO: u16 = 0xAAAD;

/// Revision value meaning "no revision reported".
pub const REVISION_UNSET: u16 = 0xFFFF;
