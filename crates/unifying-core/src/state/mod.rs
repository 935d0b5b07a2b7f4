//! State machine module.

pub mod handlers;
pub mod machine;
pub mod retry;
pub mod runtime;

pub use handlers::{Notification, classify_notification, handle_notification};
pub use machine::{DeviceFlags, LifecycleContext, LifecycleState};
pub use retry::{Delay, NoDelay, RetryError, RetryPolicy, ThreadDelay, retry};
