//! Mock HID transport for testing.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use super::traits::{HidTransport, TransportError};

/// What the next read returns.
#[derive(Debug, Clone)]
enum MockRead {
    Frame(Vec<u8>),
    Error(io::ErrorKind),
}

#[derive(Debug, Default)]
struct MockState {
    reads: VecDeque<MockRead>,
    write_faults: VecDeque<io::ErrorKind>,
    writes: Vec<Vec<u8>>,
    read_attempts: usize,
    close_count: usize,
    open: bool,
}

/// Mock transport for unit testing protocol and lifecycle logic.
///
/// Clones share state, so a test can keep one clone for inspection while
/// the device under test owns another.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                open: true,
                ..Default::default()
            })),
        }
    }

    /// Queue a raw frame to be returned on a later read.
    pub fn queue_frame(&self, frame: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .reads
            .push_back(MockRead::Frame(frame.to_vec()));
    }

    /// Queue an I/O failure to be returned on a later read.
    pub fn queue_read_error(&self, kind: io::ErrorKind) {
        self.state
            .lock()
            .unwrap()
            .reads
            .push_back(MockRead::Error(kind));
    }

    /// Make the next write fail.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        self.state.lock().unwrap().write_faults.push_back(kind);
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Clear captured writes.
    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn pending_reads(&self) -> usize {
        self.state.lock().unwrap().reads.len()
    }

    pub fn read_attempts(&self) -> usize {
        self.state.lock().unwrap().read_attempts
    }

    /// Number of closes that actually released the descriptor.
    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().close_count
    }

    /// Simulate the device reappearing after a close.
    pub fn reopen(&self) {
        self.state.lock().unwrap().open = true;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HidTransport for MockTransport {
    fn write(&mut self, data: &[u8], _timeout_ms: u64) -> Result<usize, TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if let Some(kind) = state.write_faults.pop_front() {
            return Err(TransportError::Io(io::Error::from(kind)));
        }
        state.writes.push(data.to_vec());
        Ok(data.len())
    }

    fn read(&mut self, max_len: usize, timeout_ms: u64) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        state.read_attempts += 1;
        match state.reads.pop_front() {
            Some(MockRead::Frame(mut frame)) => {
                frame.truncate(max_len);
                Ok(frame)
            }
            Some(MockRead::Error(kind)) => Err(TransportError::Io(io::Error::from(kind))),
            None => Err(TransportError::Timeout { timeout_ms }),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::*;

    #[test]
    fn test_mock_read_queue() {
        let mut mock = MockTransport::new();
        mock.queue_frame(&[0x10, 0xFF, 0x81, 0xF1, 0x01, 0x12, 0x01]);

        let msg = mock.receive(HIDPP_VERSION_1, 10).unwrap();
        assert_eq!(msg.sub_id, SUBID_GET_REGISTER);

        // Queue is empty now
        assert!(mock.receive(HIDPP_VERSION_1, 10).unwrap_err().is_timeout());
        assert_eq!(mock.read_attempts(), 2);
    }

    #[test]
    fn test_mock_write_capture() {
        let mut mock = MockTransport::new();
        let msg = Message::short(DEVICE_INDEX_RECEIVER, SUBID_SET_REGISTER, 0x00);
        mock.send(&msg, 10).unwrap();
        mock.send(&msg, 10).unwrap();

        let writes = mock.get_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], vec![0x10, 0xFF, 0x80, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_mock_close_is_idempotent() {
        let mut mock = MockTransport::new();
        mock.close().unwrap();
        mock.close().unwrap();
        assert_eq!(mock.close_count(), 1);
        assert!(!mock.is_open());
        assert!(matches!(
            mock.write(b"test", 10),
            Err(TransportError::NotOpen)
        ));
    }

    #[test]
    fn test_transfer_skips_notifications() {
        let mut mock = MockTransport::new();
        mock.queue_frame(&[0x10, 0x01, 0x41, 0x04, 0x61, 0x2B, 0x40]);
        mock.queue_frame(&[0x10, 0xFF, 0x81, 0xF1, 0x01, 0x12, 0x01]);

        let mut msg = Message::short(
            DEVICE_INDEX_RECEIVER,
            SUBID_GET_REGISTER,
            REGISTER_DEVICE_FIRMWARE_INFORMATION,
        )
        .with_payload(&[0x01]);
        mock.transfer(&mut msg, 10).unwrap();
        assert_eq!(msg.data(), &[0x01, 0x12, 0x01]);
        assert_eq!(mock.pending_reads(), 0);
    }

    #[test]
    fn test_transfer_surfaces_error_reply() {
        let mut mock = MockTransport::new();
        mock.queue_frame(&[0x10, 0xFF, 0x8F, 0x81, 0xF1, 0x03, 0x00]);

        let mut msg = Message::short(DEVICE_INDEX_RECEIVER, SUBID_GET_REGISTER, 0xF1);
        let err = mock.transfer(&mut msg, 10).unwrap_err();
        assert!(err.is_invalid_data());
    }

    #[test]
    fn test_transfer_gives_up_on_noise() {
        let mut mock = MockTransport::new();
        for _ in 0..=MAX_IGNORED_MESSAGES {
            mock.queue_frame(&[0x10, 0x01, 0x49, 0x00, 0x00, 0x00, 0x00]);
        }
        let mut msg = Message::short(DEVICE_INDEX_RECEIVER, SUBID_GET_REGISTER, 0xF1);
        assert!(matches!(
            mock.transfer(&mut msg, 10),
            Err(TransportError::TooManyUnrelated { .. })
        ));
    }

    #[test]
    fn test_write_fault() {
        let mut mock = MockTransport::new();
        mock.fail_next_write(io::ErrorKind::BrokenPipe);
        let msg = Message::short(DEVICE_INDEX_RECEIVER, SUBID_SET_REGISTER, 0x00);
        assert!(matches!(mock.send(&msg, 10), Err(TransportError::Io(_))));
        assert!(mock.get_writes().is_empty());
    }
}
