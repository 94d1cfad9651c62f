//! Loyalty-Points Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository and accrual-source ports
//! - `application/` - Retry envelope and the accrual reconciliation poller
//! - `infra/` - PostgreSQL repository, accrual HTTP client
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Consistency Model
//! - Order numbers are globally unique; duplicate submission signals whether
//!   the caller or another account owns the number
//! - The poller is the sole writer of order status/accrual and balance
//!   credits; withdrawals are the sole writer of debits
//! - The `current >= 0` CHECK constraint plus row-level locking is the only
//!   synchronization between a withdrawal and a concurrent credit

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::poller::AccrualPoller;
pub use application::retry::RetryPolicy;
pub use error::{LoyaltyError, LoyaltyResult};
pub use infra::accrual::AccrualClient;
pub use infra::postgres::PgLoyaltyRepository;
pub use presentation::router::{user_router, user_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
