//! Background polling for unsolicited reports.
//!
//! A poll thread wakes every interval, takes the transport lock, performs a
//! single short receive and hands any decoded message to a callback. The
//! lock is the same one synchronous transfers take, so a tick never runs
//! inside a transfer's send/receive window.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use super::traits::HidTransport;
use crate::protocol::Message;

/// Transport slot shared by the device and its poll thread; `None` once closed.
pub type SharedTransport<T> = Arc<Mutex<Option<T>>>;

pub fn lock_transport<T>(transport: &SharedTransport<T>) -> MutexGuard<'_, Option<T>> {
    transport.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of a single poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A message was decoded and handed to the callback.
    Delivered,
    /// Nothing pending.
    Idle,
    /// The transport has been closed.
    Closed,
    /// The read failed for a reason other than a timeout.
    Failed,
}

/// Run one poll tick.
pub fn poll_once<T, F>(
    transport: &SharedTransport<T>,
    protocol_version: u8,
    timeout_ms: u64,
    callback: &mut F,
) -> PollOutcome
where
    T: HidTransport,
    F: FnMut(Message),
{
    let mut guard = lock_transport(transport);
    let Some(t) = guard.as_mut() else {
        return PollOutcome::Closed;
    };
    match t.receive(protocol_version, timeout_ms) {
        Ok(msg) => {
            drop(guard);
            callback(msg);
            PollOutcome::Delivered
        }
        Err(e) if e.is_timeout() => PollOutcome::Idle,
        Err(e) => {
            warn!(error = %e, "Failed to get pending read");
            PollOutcome::Failed
        }
    }
}

/// Cancellation token for a scheduled poll.
///
/// Cancelling closes the wakeup channel and joins the thread, so once
/// `cancel` returns no further callback can run. Dropping the handle cancels.
#[derive(Debug)]
pub struct PollHandle {
    cancel: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn cancel(&mut self) {
        drop(self.cancel.take());
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                warn!("Poll thread panicked");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Start polling `transport` every `interval`.
pub fn schedule_polling<T, F>(
    transport: SharedTransport<T>,
    interval: Duration,
    protocol_version: u8,
    timeout_ms: u64,
    mut callback: F,
) -> io::Result<PollHandle>
where
    T: HidTransport + 'static,
    F: FnMut(Message) + Send + 'static,
{
    let (cancel_tx, cancel_rx) = channel::bounded::<()>(0);

    let thread = thread::Builder::new()
        .name("unifying-poll".into())
        .spawn(move || {
            debug!(interval_ms = interval.as_millis() as u64, "Poll thread started");
            loop {
                match cancel_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        poll_once(&transport, protocol_version, timeout_ms, &mut callback);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("Poll thread stopping");
        })?;

    Ok(PollHandle {
        cancel: Some(cancel_tx),
        thread: Some(thread),
    })
}
