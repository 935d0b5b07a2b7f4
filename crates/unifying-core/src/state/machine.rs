//! Lifecycle state of a receiver.

use std::fmt;

use bitflags::bitflags;

/// Lifecycle state of a runtime-mode receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No handle held.
    #[default]
    Closed,
    /// Handle held, identity not read yet.
    Open,
    /// Identity read and frozen.
    Ready,
    /// Update mode requested; the device will re-enumerate.
    Detached,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Closed => write!(f, "CLOSED"),
            LifecycleState::Open => write!(f, "OPEN"),
            LifecycleState::Ready => write!(f, "READY"),
            LifecycleState::Detached => write!(f, "DETACHED"),
        }
    }
}

impl LifecycleState {
    /// Whether a handle is expected to be held in this state.
    pub fn is_open(&self) -> bool {
        !matches!(self, LifecycleState::Closed)
    }
}

bitflags! {
    /// Device flags reported upward.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct DeviceFlags: u32 {
        const UPDATABLE = 1 << 0;
        /// Caller must wait for the device to disappear and come back.
        const WAIT_FOR_REPLUG = 1 << 1;
    }
}

/// Lifecycle bookkeeping shared by every lifecycle operation.
#[derive(Debug, Default)]
pub struct LifecycleContext {
    pub state: LifecycleState,
    pub flags: DeviceFlags,
}

impl LifecycleContext {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Closed,
            flags: DeviceFlags::UPDATABLE,
        }
    }

    /// Transition to a new state.
    pub fn goto_state(&mut self, new_state: LifecycleState) {
        tracing::info!(from = %self.state, to = %new_state, "State transition");
        self.state = new_state;
    }
}
