//! HID transport layer abstraction.
//!
//! Defines the `HidTransport` trait for raw report I/O against one open
//! device node, plus the HID++ send/receive/transfer operations built on
//! top of it.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::protocol::{CodecError, MAX_IGNORED_MESSAGES, MAX_READ_LEN, Message, ProtocolError};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device unavailable at {path}: {message}")]
    DeviceUnavailable { path: String, message: String },

    #[error("Device is not open")]
    NotOpen,

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Ignored {ignored} unrelated messages while waiting for a reply")]
    TooManyUnrelated { ignored: usize },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// Device answered with an "invalid data" class error.
    pub fn is_invalid_data(&self) -> bool {
        matches!(self, TransportError::Protocol(e) if e.is_invalid_data())
    }
}

/// Abstract HID transport over one open device node.
///
/// This trait enables:
/// - Production implementation over hidraw
/// - Mock implementation for unit testing
pub trait HidTransport: Send {
    /// Write one raw report, waiting at most `timeout_ms` for the node to accept it.
    fn write(&mut self, data: &[u8], timeout_ms: u64) -> Result<usize, TransportError>;

    /// Read one raw report, waiting at most `timeout_ms` for data.
    fn read(&mut self, max_len: usize, timeout_ms: u64) -> Result<Vec<u8>, TransportError>;

    /// Release the descriptor. Closing a closed transport is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;

    /// Encode and write `msg`.
    fn send(&mut self, msg: &Message, timeout_ms: u64) -> Result<(), TransportError> {
        let buf = msg.to_bytes()?;
        let timeout_ms = msg.timeout_ms(timeout_ms);
        debug!(msg = %msg, timeout_ms, "Sending");
        let written = self.write(&buf, timeout_ms)?;
        if written != buf.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: buf.len(),
            });
        }
        Ok(())
    }

    /// Read and decode one message.
    fn receive(&mut self, protocol_version: u8, timeout_ms: u64) -> Result<Message, TransportError> {
        let buf = self.read(MAX_READ_LEN, timeout_ms)?;
        let msg = Message::from_bytes(&buf, protocol_version)?;
        debug!(msg = %msg, "Received");
        Ok(msg)
    }

    /// Send `msg` and wait for its reply, which replaces `msg`.
    ///
    /// Unrelated frames arriving in the meantime are skipped; an error reply
    /// is surfaced as [`TransportError::Protocol`].
    fn transfer(&mut self, msg: &mut Message, timeout_ms: u64) -> Result<(), TransportError> {
        self.send(msg, timeout_ms)?;

        let budget = msg.timeout_ms(timeout_ms);
        let mut ignored = 0;
        loop {
            let reply = self.receive(msg.protocol_version, budget)?;
            reply.is_error_reply()?;
            if reply.is_reply_to(msg) {
                let flags = msg.flags;
                *msg = reply;
                msg.flags = flags;
                return Ok(());
            }
            ignored += 1;
            if ignored > MAX_IGNORED_MESSAGES {
                return Err(TransportError::TooManyUnrelated { ignored });
            }
            debug!(msg = %reply, "Ignoring unrelated message");
        }
    }
}

/// Produces a transport for a device path.
pub trait TransportOpener<T: HidTransport>: Send + Sync {
    fn open(&self, path: &Path) -> Result<T, TransportError>;
}

impl<T, F> TransportOpener<T> for F
where
    T: HidTransport,
    F: Fn(&Path) -> Result<T, TransportError> + Send + Sync,
{
    fn open(&self, path: &Path) -> Result<T, TransportError> {
        self(path)
    }
}
