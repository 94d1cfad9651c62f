//! Domain Layer
//!
//! Contains entities, value objects, and the ports the application layer
//! drives (storage repositories, accrual source).

pub mod accrual;
pub mod balance;
pub mod credentials;
pub mod order;
pub mod order_number;
pub mod repository;

// Re-exports
pub use accrual::{AccrualReply, AccrualResult, AccrualSource};
pub use balance::Balance;
pub use credentials::Credentials;
pub use order::{LoyaltyOrder, OrderStatus, Withdrawal};
pub use order_number::OrderNumber;
pub use repository::{
    AccrualRepository, BalanceRepository, OrderRepository, SecurityRepository, UserRepository,
};
