//! Device-reported error replies.
//!
//! A HID++ 1.0 error reply uses sub id `0x8F`; a HID++ 2.0 error reply uses
//! `0xFF`. In both cases the function id echoes the failed request, payload
//! byte 0 echoes its register or function, and payload byte 1 holds the
//! error code.

use std::fmt;
use thiserror::Error;

use super::constants::*;
use super::message::Message;

/// Broad class of a device-reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotSupported,
    InvalidData,
    HostUnreachable,
    NoSpace,
    Exists,
    Busy,
    NotFound,
    ConnectionRefused,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotSupported => "not supported",
            ErrorKind::InvalidData => "invalid data",
            ErrorKind::HostUnreachable => "host unreachable",
            ErrorKind::NoSpace => "no space",
            ErrorKind::Exists => "exists",
            ErrorKind::Busy => "busy",
            ErrorKind::NotFound => "not found",
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// Error code carried by a well-formed error reply.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(
    "HID++{version}.0 error 0x{code:02X} ({}) for request {request:02X}/{register:02X}",
    describe(.version, .code)
)]
pub struct ProtocolError {
    pub version: u8,
    pub code: u8,
    /// Sub id (1.0) or feature index (2.0) of the failed request.
    pub request: u8,
    /// Register (1.0) or function (2.0) of the failed request.
    pub register: u8,
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        if self.version == HIDPP_VERSION_2 {
            return match self.code {
                HIDPP_ERR20_INVALID_ARGUMENT | HIDPP_ERR20_OUT_OF_RANGE => ErrorKind::InvalidData,
                HIDPP_ERR20_INVALID_FEATURE_INDEX
                | HIDPP_ERR20_INVALID_FUNCTION_ID
                | HIDPP_ERR20_UNSUPPORTED => ErrorKind::NotSupported,
                HIDPP_ERR20_BUSY => ErrorKind::Busy,
                _ => ErrorKind::Internal,
            };
        }
        match self.code {
            HIDPP_ERR_INVALID_SUBID => ErrorKind::NotSupported,
            HIDPP_ERR_INVALID_ADDRESS
            | HIDPP_ERR_INVALID_VALUE
            | HIDPP_ERR_INVALID_PARAM_VALUE => ErrorKind::InvalidData,
            HIDPP_ERR_CONNECT_FAIL | HIDPP_ERR_RESOURCE_ERROR => ErrorKind::HostUnreachable,
            HIDPP_ERR_TOO_MANY_DEVICES => ErrorKind::NoSpace,
            HIDPP_ERR_ALREADY_EXISTS | HIDPP_ERR_REQUEST_UNAVAILABLE => ErrorKind::Exists,
            HIDPP_ERR_BUSY => ErrorKind::Busy,
            HIDPP_ERR_UNKNOWN_DEVICE => ErrorKind::NotFound,
            HIDPP_ERR_WRONG_PIN_CODE => ErrorKind::ConnectionRefused,
            _ => ErrorKind::Internal,
        }
    }

    /// The only class the setup sequence retries.
    pub fn is_invalid_data(&self) -> bool {
        self.kind() == ErrorKind::InvalidData
    }
}

fn describe(version: &u8, code: &u8) -> &'static str {
    if *version == HIDPP_VERSION_2 {
        return match *code {
            HIDPP_ERR20_NO_ERROR => "no error",
            HIDPP_ERR20_UNKNOWN => "unknown",
            HIDPP_ERR20_INVALID_ARGUMENT => "invalid argument",
            HIDPP_ERR20_OUT_OF_RANGE => "out of range",
            HIDPP_ERR20_HARDWARE_ERROR => "hardware error",
            HIDPP_ERR20_LOGITECH_INTERNAL => "internal",
            HIDPP_ERR20_INVALID_FEATURE_INDEX => "invalid feature index",
            HIDPP_ERR20_INVALID_FUNCTION_ID => "invalid function",
            HIDPP_ERR20_BUSY => "busy",
            HIDPP_ERR20_UNSUPPORTED => "unsupported",
            _ => "generic failure",
        };
    }
    match *code {
        HIDPP_ERR_SUCCESS => "success",
        HIDPP_ERR_INVALID_SUBID => "invalid SubID",
        HIDPP_ERR_INVALID_ADDRESS => "invalid address",
        HIDPP_ERR_INVALID_VALUE => "invalid value",
        HIDPP_ERR_CONNECT_FAIL => "connection request failed",
        HIDPP_ERR_TOO_MANY_DEVICES => "too many devices connected",
        HIDPP_ERR_ALREADY_EXISTS => "already exists",
        HIDPP_ERR_BUSY => "busy",
        HIDPP_ERR_UNKNOWN_DEVICE => "device not found",
        HIDPP_ERR_RESOURCE_ERROR => "resource error",
        HIDPP_ERR_REQUEST_UNAVAILABLE => "request not valid in current context",
        HIDPP_ERR_INVALID_PARAM_VALUE => "request parameter has unsupported value",
        HIDPP_ERR_WRONG_PIN_CODE => "the pin code was wrong",
        _ => "generic failure",
    }
}

impl Message {
    /// Surface an error reply as a typed error.
    ///
    /// Replies that are not error replies, and error replies whose code is
    /// the "success" code, are `Ok`.
    pub fn is_error_reply(&self) -> Result<(), ProtocolError> {
        let error_sub_id = match self.protocol_version {
            HIDPP_VERSION_1 => SUBID_ERROR_MSG,
            HIDPP_VERSION_2 => SUBID_ERROR_MSG_20,
            _ => return Ok(()),
        };
        if self.sub_id != error_sub_id {
            return Ok(());
        }
        let code = self.payload[1];
        if code == HIDPP_ERR_SUCCESS {
            return Ok(());
        }
        Err(ProtocolError {
            version: self.protocol_version,
            code,
            request: self.function_id,
            register: self.payload[0],
        })
    }
}

/// Free-function form of [`Message::is_error_reply`].
pub fn is_error_reply(msg: &Message) -> Result<(), ProtocolError> {
    msg.is_error_reply()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(frame: &[u8], version: u8) -> Message {
        Message::from_bytes(frame, version).unwrap()
    }

    #[test]
    fn test_v1_error_reply() {
        let msg = decode(&[0x10, 0xFF, 0x8F, 0x81, 0xF1, 0x03, 0x00], 1);
        let err = msg.is_error_reply().unwrap_err();
        assert_eq!(err.code, HIDPP_ERR_INVALID_VALUE);
        assert_eq!(err.request, SUBID_GET_REGISTER);
        assert_eq!(err.register, REGISTER_DEVICE_FIRMWARE_INFORMATION);
        assert!(err.is_invalid_data());
        assert!(err.to_string().contains("invalid value"));
    }

    #[test]
    fn test_v1_busy_is_not_retryable() {
        let msg = decode(&[0x10, 0xFF, 0x8F, 0x80, 0x00, 0x07, 0x00], 1);
        let err = msg.is_error_reply().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Busy);
        assert!(!err.is_invalid_data());
    }

    #[test]
    fn test_success_code_is_not_an_error() {
        let msg = decode(&[0x10, 0xFF, 0x8F, 0x81, 0xF1, 0x00, 0x00], 1);
        assert!(msg.is_error_reply().is_ok());
    }

    #[test]
    fn test_regular_reply_is_ok() {
        let msg = decode(&[0x10, 0xFF, 0x81, 0xF1, 0x01, 0x12, 0x01], 1);
        assert!(is_error_reply(&msg).is_ok());
    }

    #[test]
    fn test_v2_error_reply() {
        let mut frame = vec![0x11, 0x01, 0xFF, 0x05, 0x1A, 0x02];
        frame.resize(LONG_FRAME_LEN, 0);
        let err = decode(&frame, 2).is_error_reply().unwrap_err();
        assert_eq!(err.version, 2);
        assert_eq!(err.kind(), ErrorKind::InvalidData);

        // 0xFF is only an error sub id under 2.0
        assert!(decode(&frame, 1).is_error_reply().is_ok());
    }
}
