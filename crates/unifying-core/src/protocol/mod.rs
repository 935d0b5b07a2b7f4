//! Protocol module - HID++ definitions and frame codec.

pub mod constants;
pub mod message;
pub mod reply;

pub use constants::*;
pub use message::{CodecError, Message, MessageFlags, ReportKind, decode, encode};
pub use reply::{ErrorKind, ProtocolError, is_error_reply};
