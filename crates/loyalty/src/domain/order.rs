//! Order Entities
//!
//! One `orders` table backs two kinds of rows: loyalty orders
//! (`processable = true`) that the accrual poller reconciles, and withdrawal
//! records (`processable = false`) that never change after creation. The two
//! never appear in each other's listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a loyalty order
///
/// `Processed` and `Invalid` are terminal; the poller stops re-querying a
/// number once either is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Registered => "REGISTERED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    /// Whether the poller is done with orders in this state
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Invalid)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "REGISTERED" => Ok(OrderStatus::Registered),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// Loyalty order as read back for listings
#[derive(Debug, Clone)]
pub struct LoyaltyOrder {
    pub number: i64,
    pub status: OrderStatus,
    /// Points credited once the order reaches `Processed`
    pub accrual: Option<f64>,
    pub uploaded_at: DateTime<Utc>,
}

/// Withdrawal record: an order-numbered debit against a balance
#[derive(Debug, Clone)]
pub struct Withdrawal {
    pub order: i64,
    pub sum: f64,
    pub processed_at: DateTime<Utc>,
}
