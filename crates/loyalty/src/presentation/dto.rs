//! Request / Response DTOs
//!
//! Wire shapes only; conversion from domain types pins the JSON the API
//! promises: order numbers travel as strings, absent accruals are omitted,
//! timestamps are RFC 3339 without fractional seconds.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::balance::Balance;
use crate::domain::order::{LoyaltyOrder, OrderStatus, Withdrawal};

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Loyalty order as listed by `GET /api/user/orders`
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
    pub uploaded_at: String,
}

impl From<LoyaltyOrder> for OrderResponse {
    fn from(order: LoyaltyOrder) -> Self {
        Self {
            number: order.number.to_string(),
            status: order.status,
            accrual: order.accrual,
            uploaded_at: rfc3339(order.uploaded_at),
        }
    }
}

/// Body of `GET /api/user/balance`
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub current: f64,
    pub withdrawn: f64,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            current: balance.current,
            withdrawn: balance.withdrawn,
        }
    }
}

/// Body of `POST /api/user/balance/withdraw`
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: f64,
}

/// Withdrawal record as listed by `GET /api/user/withdrawals`
#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: f64,
    pub processed_at: String,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            order: withdrawal.order.to_string(),
            sum: withdrawal.sum,
            processed_at: rfc3339(withdrawal.processed_at),
        }
    }
}
