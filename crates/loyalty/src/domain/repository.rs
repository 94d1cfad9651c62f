//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in the infrastructure
//! layer. Every operation resolves to success or one member of the closed
//! domain-error set; infrastructural failures surface as `Database`.

use crate::domain::accrual::AccrualResult;
use crate::domain::balance::Balance;
use crate::domain::credentials::Credentials;
use crate::domain::order::{LoyaltyOrder, Withdrawal};
use crate::domain::order_number::OrderNumber;
use crate::error::LoyaltyResult;

/// Account registration and authentication
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Create an account, returning its id. Taken login -> `AlreadyExists`.
    async fn register_user(&self, creds: &Credentials) -> LoyaltyResult<i64>;

    /// Resolve credentials to an account id. Unknown login and wrong
    /// password collapse into the single `NotExists` signal.
    async fn auth_user(&self, creds: &Credentials) -> LoyaltyResult<i64>;
}

/// Loyalty-order submission and listing
#[trait_variant::make(OrderRepository: Send)]
pub trait LocalOrderRepository {
    /// Insert a fresh loyalty order. Duplicate number ->
    /// `OrderAlreadyExists` (same account) or `OtherOrderAlreadyExists`.
    async fn create_order(&self, user_id: i64, number: OrderNumber) -> LoyaltyResult<()>;

    /// Loyalty orders for an account, newest upload first.
    /// Empty -> `EmptyData`.
    async fn list_orders(&self, user_id: i64) -> LoyaltyResult<Vec<LoyaltyOrder>>;
}

/// Balance reads, withdrawals, and the withdrawal history
#[trait_variant::make(BalanceRepository: Send)]
pub trait LocalBalanceRepository {
    /// Current balance; a missing row reads as zeros.
    async fn get_balance(&self, user_id: i64) -> LoyaltyResult<Balance>;

    /// Atomically debit the balance and record the withdrawal.
    /// Insufficient funds -> `NotEnough`; duplicate order number ->
    /// `OrderAlreadyExists`.
    async fn withdraw(&self, user_id: i64, order: OrderNumber, sum: f64) -> LoyaltyResult<()>;

    /// Withdrawal records for an account, newest first.
    /// Empty -> `EmptyData`.
    async fn list_withdrawals(&self, user_id: i64) -> LoyaltyResult<Vec<Withdrawal>>;
}

/// Poller-side storage access
#[trait_variant::make(AccrualRepository: Send)]
pub trait LocalAccrualRepository {
    /// Numbers of loyalty orders that still need reconciliation.
    async fn poll_candidates(&self) -> LoyaltyResult<Vec<i64>>;

    /// Apply a batch of accrual verdicts in one transaction, crediting
    /// balances for orders that reached `Processed`.
    async fn save_results(&self, results: &[AccrualResult]) -> LoyaltyResult<()>;
}

/// Token-signing secret persistence
#[trait_variant::make(SecurityRepository: Send)]
pub trait LocalSecurityRepository {
    /// Generate and store the signing secret on first boot; later boots
    /// leave the existing secret untouched.
    async fn init_secret_key(&self) -> LoyaltyResult<()>;

    /// Read the signing secret.
    async fn get_secret_key(&self) -> LoyaltyResult<String>;
}
