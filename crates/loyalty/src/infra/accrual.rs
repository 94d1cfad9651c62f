//! Accrual Service Client
//!
//! Thin reqwest wrapper over `GET {base}/api/orders/{number}`. One shared
//! client instance is reused for every request; interpretation of the
//! response is factored out so it can be tested without a live service.

use std::time::Duration;

use axum::http::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};

use crate::application::poller::POLL_INTERVAL;
use crate::domain::accrual::{AccrualReply, AccrualResult, AccrualSource};
use crate::error::{LoyaltyError, LoyaltyResult};

/// HTTP client for the external accrual calculator
#[derive(Clone)]
pub struct AccrualClient {
    client: Client,
    base_url: String,
}

impl AccrualClient {
    /// `base_url` is scheme + host, no trailing slash
    pub fn new(base_url: String) -> LoyaltyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(LoyaltyError::Accrual)?;

        Ok(Self { client, base_url })
    }
}

impl AccrualSource for AccrualClient {
    async fn order_status(&self, number: i64) -> LoyaltyResult<AccrualReply> {
        let url = format!("{}/api/orders/{}", self.base_url, number);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        Ok(interpret(status, retry_after.as_deref(), &body))
    }
}

/// Map a raw accrual-service response onto a reply
///
/// A 200 body that does not parse (including an unknown status string) is
/// treated the same as a server failure: log and skip the number this tick.
fn interpret(status: StatusCode, retry_after: Option<&str>, body: &[u8]) -> AccrualReply {
    match status {
        StatusCode::OK => match serde_json::from_slice::<AccrualResult>(body) {
            Ok(result) => AccrualReply::Ready(result),
            Err(e) => {
                tracing::error!(error = %e, "Unparseable accrual response");
                AccrualReply::Unavailable
            }
        },
        StatusCode::NO_CONTENT => AccrualReply::NotRegistered,
        StatusCode::TOO_MANY_REQUESTS => {
            // Retry-After is whole seconds; fall back to one poll interval
            // when the header is missing or malformed.
            let retry_after = retry_after
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(POLL_INTERVAL);
            AccrualReply::Throttled { retry_after }
        }
        other => {
            tracing::error!(status = %other, "Unexpected accrual response status");
            AccrualReply::Unavailable
        }
    }
}
