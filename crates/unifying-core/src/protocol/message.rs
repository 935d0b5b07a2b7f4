//! HID++ message framing.
//!
//! Every frame starts with a four byte header
//! `[report id][device index][sub id][function id]` followed by a payload
//! whose size is fixed by the report id: 3 bytes for short reports and
//! 16 bytes for long reports.

use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

use super::constants::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },
    #[error("Unknown report kind 0x{0:02X}")]
    UnknownReportKind(u8),
}

/// Frame size selector, carried on the wire as the report id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Short,
    Long,
}

impl ReportKind {
    pub fn from_report_id(id: u8) -> Option<Self> {
        match id {
            REPORT_ID_SHORT => Some(Self::Short),
            REPORT_ID_LONG => Some(Self::Long),
            _ => None,
        }
    }

    pub const fn report_id(self) -> u8 {
        match self {
            Self::Short => REPORT_ID_SHORT,
            Self::Long => REPORT_ID_LONG,
        }
    }

    /// Total frame length including the header.
    pub const fn frame_len(self) -> usize {
        match self {
            Self::Short => SHORT_FRAME_LEN,
            Self::Long => LONG_FRAME_LEN,
        }
    }

    pub const fn payload_len(self) -> usize {
        self.frame_len() - HEADER_LEN
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Short => write!(f, "short"),
            ReportKind::Long => write!(f, "long"),
        }
    }
}

bitflags! {
    /// Transfer hints. Never sent on the wire.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MessageFlags: u8 {
        /// Multiply the timeout budget, used for bootloader-mode transitions.
        const LONGER_TIMEOUT = 1 << 0;
    }
}

/// A single HID++ message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub report_kind: ReportKind,
    pub device_index: u8,
    pub sub_id: u8,
    pub function_id: u8,
    /// Backing storage for the payload; only `report_kind.payload_len()` bytes are meaningful.
    pub payload: [u8; LONG_PAYLOAD_LEN],
    pub protocol_version: u8,
    pub flags: MessageFlags,
}

impl Message {
    pub fn new(report_kind: ReportKind, device_index: u8, sub_id: u8, function_id: u8) -> Self {
        Self {
            report_kind,
            device_index,
            sub_id,
            function_id,
            payload: [0; LONG_PAYLOAD_LEN],
            protocol_version: HIDPP_VERSION_1,
            flags: MessageFlags::empty(),
        }
    }

    /// Short HID++ 1.0 message.
    pub fn short(device_index: u8, sub_id: u8, function_id: u8) -> Self {
        Self::new(ReportKind::Short, device_index, sub_id, function_id)
    }

    /// Long HID++ 1.0 message.
    pub fn long(device_index: u8, sub_id: u8, function_id: u8) -> Self {
        Self::new(ReportKind::Long, device_index, sub_id, function_id)
    }

    /// Copy `data` into the start of the payload.
    ///
    /// Bytes past the long payload size are dropped; bytes past the short
    /// payload size on a short message make the message fail to encode.
    pub fn with_payload(mut self, data: &[u8]) -> Self {
        let n = data.len().min(LONG_PAYLOAD_LEN);
        self.payload[..n].copy_from_slice(&data[..n]);
        self
    }

    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version;
        self
    }

    /// Usable part of the payload.
    pub fn data(&self) -> &[u8] {
        &self.payload[..self.report_kind.payload_len()]
    }

    /// Timeout budget for this message given the base timeout.
    pub fn timeout_ms(&self, base_ms: u64) -> u64 {
        if self.flags.contains(MessageFlags::LONGER_TIMEOUT) {
            base_ms.saturating_mul(LONGER_TIMEOUT_MULTIPLIER)
        } else {
            base_ms
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let len = self.report_kind.payload_len();
        if let Some(pos) = self.payload[len..].iter().position(|&b| b != 0) {
            return Err(CodecError::MalformedMessage(format!(
                "{} report carries data at payload offset {}, capacity is {} bytes",
                self.report_kind,
                len + pos,
                len
            )));
        }

        let mut buf = Vec::with_capacity(self.report_kind.frame_len());
        buf.push(self.report_kind.report_id());
        buf.push(self.device_index);
        buf.push(self.sub_id);
        buf.push(self.function_id);
        buf.extend_from_slice(&self.payload[..len]);
        Ok(buf)
    }

    /// Parse a frame. Trailing bytes past the frame size are ignored.
    pub fn from_bytes(data: &[u8], protocol_version: u8) -> Result<Self, CodecError> {
        let Some(&report_id) = data.first() else {
            return Err(CodecError::TruncatedFrame {
                expected: 1,
                actual: 0,
            });
        };
        let report_kind =
            ReportKind::from_report_id(report_id).ok_or(CodecError::UnknownReportKind(report_id))?;

        let frame_len = report_kind.frame_len();
        if data.len() < frame_len {
            return Err(CodecError::TruncatedFrame {
                expected: frame_len,
                actual: data.len(),
            });
        }

        let mut payload = [0u8; LONG_PAYLOAD_LEN];
        payload[..report_kind.payload_len()].copy_from_slice(&data[HEADER_LEN..frame_len]);

        Ok(Self {
            report_kind,
            device_index: data[1],
            sub_id: data[2],
            function_id: data[3],
            payload,
            protocol_version,
            flags: MessageFlags::empty(),
        })
    }

    /// Whether `self` answers `request`.
    ///
    /// HID++ 1.0 replies echo the device index, sub id and register of the
    /// request; HID++ 2.0 replies echo the device index and feature index.
    pub fn is_reply_to(&self, request: &Message) -> bool {
        if self.device_index != request.device_index {
            return false;
        }
        if self.sub_id != request.sub_id {
            return false;
        }
        if request.protocol_version == HIDPP_VERSION_1 && self.function_id != request.function_id
        {
            return false;
        }
        true
    }
}

/// Encode a message into its wire representation.
pub fn encode(msg: &Message) -> Result<Vec<u8>, CodecError> {
    msg.to_bytes()
}

/// Decode a wire frame.
pub fn decode(data: &[u8], protocol_version: u8) -> Result<Message, CodecError> {
    Message::from_bytes(data, protocol_version)
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X} {:02X} {:02X} {:02X} |",
            self.report_kind.report_id(),
            self.device_index,
            self.sub_id,
            self.function_id
        )?;
        for b in self.data() {
            write!(f, " {:02X}", b)?;
        }
        Ok(())
    }
}
