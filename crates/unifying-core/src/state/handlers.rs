//! Notification handlers - dispatch logic for unsolicited receiver reports.

use tracing::{debug, warn};

use crate::events::DeviceEvent;
use crate::protocol::constants::*;
use crate::protocol::{Message, ProtocolError, ReportKind};

/// Classification of an unsolicited message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Surfaced to the device owner.
    Event(DeviceEvent),
    /// Recognised but uninteresting.
    Ignored(&'static str),
    /// The device reported an error outside a transfer.
    DeviceError(ProtocolError),
    /// Unrecognised sub id.
    Unknown(u8),
}

/// Classify a message read by the poll loop.
pub fn classify_notification(msg: &Message) -> Notification {
    if let Err(e) = msg.is_error_reply() {
        return Notification::DeviceError(e);
    }
    if msg.report_kind != ReportKind::Short {
        return Notification::Ignored("long report");
    }
    match msg.sub_id {
        SUBID_DEVICE_CONNECTION => Notification::Event(DeviceEvent::connection(msg)),
        SUBID_DEVICE_DISCONNECTION => Notification::Event(DeviceEvent::disconnection(msg)),
        SUBID_DEVICE_LOCKING_CHANGED => Notification::Event(DeviceEvent::locking_changed(msg)),
        SUBID_LINK_QUALITY => Notification::Ignored("link quality"),
        SUBID_ERROR_MESSAGE => Notification::Ignored("error message"),
        other => Notification::Unknown(other),
    }
}

/// Handle a polled message, returning the event to surface, if any.
pub fn handle_notification(msg: &Message) -> Option<DeviceEvent> {
    match classify_notification(msg) {
        Notification::Event(event) => {
            debug!(event = %event, "Device connection event");
            Some(event)
        }
        Notification::Ignored(what) => {
            debug!(what, "Ignoring notification");
            None
        }
        Notification::DeviceError(e) => {
            warn!(error = %e, "Failed to get pending read");
            None
        }
        Notification::Unknown(sub_id) => {
            debug!(sub_id = %format!("{:02X}", sub_id), "Unknown SubID");
            None
        }
    }
}
