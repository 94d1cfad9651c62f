//! Infrastructure Layer
//!
//! Database implementations and external service integrations.

pub mod accrual;
pub mod postgres;

pub use accrual::AccrualClient;
pub use postgres::PgLoyaltyRepository;
