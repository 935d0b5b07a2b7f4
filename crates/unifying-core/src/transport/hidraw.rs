//! hidraw-based HID transport implementation.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::traits::{HidTransport, TransportError};

/// Transport over a `/dev/hidrawN` node opened in non-blocking mode.
#[derive(Debug)]
pub struct HidrawTransport {
    path: PathBuf,
    file: Option<File>,
}

impl HidrawTransport {
    /// Open the node for reading and writing without blocking.
    #[instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| TransportError::DeviceUnavailable {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        info!(fd = file.as_raw_fd(), "Device opened successfully");
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut File, TransportError> {
        self.file.as_mut().ok_or(TransportError::NotOpen)
    }
}

/// Wait until `fd` is ready for `events`, or fail with `Timeout`.
fn wait_for(fd: RawFd, events: libc::c_short, timeout_ms: u64) -> Result<(), TransportError> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    let timeout = timeout_ms.min(libc::c_int::MAX as u64) as libc::c_int;
    loop {
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(TransportError::Io(err));
        }
        if rc == 0 {
            return Err(TransportError::Timeout { timeout_ms });
        }
        if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("poll reported revents 0x{:04X}", pfd.revents),
            )));
        }
        return Ok(());
    }
}

impl HidTransport for HidrawTransport {
    #[instrument(skip(self, data), fields(len = data.len()))]
    fn write(&mut self, data: &[u8], timeout_ms: u64) -> Result<usize, TransportError> {
        let file = self.file()?;
        wait_for(file.as_raw_fd(), libc::POLLOUT, timeout_ms)?;
        let n = match file.write(data) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(TransportError::Timeout { timeout_ms });
            }
            Err(e) => return Err(TransportError::Io(e)),
        };
        debug!(bytes_written = n, "Write complete");
        Ok(n)
    }

    #[instrument(skip(self))]
    fn read(&mut self, max_len: usize, timeout_ms: u64) -> Result<Vec<u8>, TransportError> {
        let file = self.file()?;
        wait_for(file.as_raw_fd(), libc::POLLIN, timeout_ms)?;
        let mut buf = vec![0u8; max_len];
        let n = match file.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(TransportError::Timeout { timeout_ms });
            }
            Err(e) => return Err(TransportError::Io(e)),
        };
        buf.truncate(n);
        debug!(bytes_read = n, "Read complete");
        Ok(buf)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let fd = file.into_raw_fd();
        if unsafe { libc::close(fd) } != 0 {
            return Err(TransportError::Io(io::Error::last_os_error()));
        }
        debug!(path = %self.path.display(), "Device closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_path() {
        let err = HidrawTransport::open(Path::new("/nonexistent/hidraw99")).unwrap_err();
        assert!(matches!(err, TransportError::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_regular_file_read_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node");
        std::fs::write(&path, [0x10, 0xFF, 0x81, 0xF1, 0x01, 0x12, 0x01]).unwrap();

        let mut transport = HidrawTransport::open(&path).unwrap();
        let frame = transport.read(32, 10).unwrap();
        assert_eq!(frame.len(), 7);

        transport.close().unwrap();
        assert!(!transport.is_open());
        transport.close().unwrap();
        assert!(matches!(
            transport.read(32, 10),
            Err(TransportError::NotOpen)
        ));
    }
}
