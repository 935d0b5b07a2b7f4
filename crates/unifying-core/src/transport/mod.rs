//! Transport layer module.

pub mod hidraw;
pub mod mock;
pub mod poll;
pub mod traits;

pub use hidraw::HidrawTransport;
pub use mock::MockTransport;
pub use poll::{PollHandle, PollOutcome, SharedTransport, poll_once, schedule_polling};
pub use traits::{HidTransport, TransportError, TransportOpener};
