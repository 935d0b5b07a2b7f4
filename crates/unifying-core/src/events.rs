//! Notification events.
//!
//! The poll thread turns unsolicited receiver reports into `DeviceEvent`s
//! and pushes them onto a channel that the device owner drains on its own
//! schedule.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::protocol::Message;

/// Events raised by a receiver while polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A paired device connected, or reported its link state.
    Connection {
        device_index: u8,
        /// Wireless protocol type.
        protocol: u8,
        link_established: bool,
        wireless_pid: u16,
    },
    /// A paired device went away.
    Disconnection { device_index: u8 },
    /// The receiver's pairing lock opened or closed.
    LockingChanged { device_index: u8, open: bool },
}

impl DeviceEvent {
    /// Decode a 0x41 device connection notification.
    pub fn connection(msg: &Message) -> Self {
        let data = msg.data();
        DeviceEvent::Connection {
            device_index: msg.device_index,
            protocol: msg.function_id,
            link_established: data[0] & 0x40 == 0,
            wireless_pid: LittleEndian::read_u16(&data[1..3]),
        }
    }

    /// Decode a 0x40 device disconnection notification.
    pub fn disconnection(msg: &Message) -> Self {
        DeviceEvent::Disconnection {
            device_index: msg.device_index,
        }
    }

    /// Decode a 0x4A locking changed notification.
    pub fn locking_changed(msg: &Message) -> Self {
        DeviceEvent::LockingChanged {
            device_index: msg.device_index,
            open: msg.function_id & 0x01 != 0,
        }
    }

    pub fn device_index(&self) -> u8 {
        match self {
            DeviceEvent::Connection { device_index, .. }
            | DeviceEvent::Disconnection { device_index }
            | DeviceEvent::LockingChanged { device_index, .. } => *device_index,
        }
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceEvent::Connection {
                device_index,
                protocol,
                link_established,
                wireless_pid,
            } => write!(
                f,
                "device {} connected (protocol 0x{:02X}, pid {:04X}, link {})",
                device_index,
                protocol,
                wireless_pid,
                if *link_established { "up" } else { "down" }
            ),
            DeviceEvent::Disconnection { device_index } => {
                write!(f, "device {} disconnected", device_index)
            }
            DeviceEvent::LockingChanged { device_index, open } => write!(
                f,
                "pairing lock {} (device {})",
                if *open { "open" } else { "closed" },
                device_index
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(frame: &[u8]) -> Message {
        Message::from_bytes(frame, 1).unwrap()
    }

    #[test]
    fn test_connection_event() {
        let event = DeviceEvent::connection(&decode(&[0x10, 0x02, 0x41, 0x04, 0x02, 0x2B, 0x40]));
        assert_eq!(
            event,
            DeviceEvent::Connection {
                device_index: 2,
                protocol: 0x04,
                link_established: true,
                wireless_pid: 0x402B,
            }
        );
        assert_eq!(event.device_index(), 2);
    }

    #[test]
    fn test_connection_link_down() {
        let event = DeviceEvent::connection(&decode(&[0x10, 0x01, 0x41, 0x04, 0x42, 0x2B, 0x40]));
        assert!(matches!(
            event,
            DeviceEvent::Connection {
                link_established: false,
                ..
            }
        ));
        assert!(event.to_string().contains("link down"));
    }

    #[test]
    fn test_locking_event() {
        let event =
            DeviceEvent::locking_changed(&decode(&[0x10, 0xFF, 0x4A, 0x01, 0x00, 0x00, 0x00]));
        assert_eq!(
            event,
            DeviceEvent::LockingChanged {
                device_index: 0xFF,
                open: true
            }
        );
    }
}
