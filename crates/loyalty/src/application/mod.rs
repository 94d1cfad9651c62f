//! Application Layer
//!
//! The retry envelope around storage calls and the accrual reconciliation
//! poller.

pub mod poller;
pub mod retry;

// Re-exports
pub use poller::AccrualPoller;
pub use retry::RetryPolicy;
