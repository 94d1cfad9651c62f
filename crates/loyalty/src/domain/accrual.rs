//! Accrual Source Port
//!
//! The external accrual calculator is reached through [`AccrualSource`];
//! the reqwest-backed implementation lives in the infrastructure layer.

use serde::Deserialize;
use std::time::Duration;

use crate::domain::order::OrderStatus;
use crate::error::LoyaltyResult;

/// Verdict returned by the accrual service for one order number
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccrualResult {
    pub order: String,
    pub status: OrderStatus,
    pub accrual: Option<f64>,
}

/// Interpreted accrual-service response
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualReply {
    /// 200 - a parsed verdict, queued for persistence
    Ready(AccrualResult),
    /// 204 - the order is unknown to the calculator; leave state unchanged
    NotRegistered,
    /// 429 - back off for the advertised window before the next number
    Throttled { retry_after: Duration },
    /// 5xx - skip this number for the current tick
    Unavailable,
}

/// Read access to the external accrual calculator
#[trait_variant::make(AccrualSource: Send)]
pub trait LocalAccrualSource {
    /// Query the calculator for one order number
    async fn order_status(&self, number: i64) -> LoyaltyResult<AccrualReply>;
}
