//! Accrual Reconciliation Poller
//!
//! A single background task that keeps loyalty orders in sync with the
//! external accrual calculator. Each tick it collects the unresolved order
//! numbers, asks the calculator about each, and persists the whole batch of
//! verdicts in one transaction. It is the only writer of order status,
//! accrual amounts, the `processed` flag, and balance credits.

use std::time::Duration;

use tokio::sync::watch;

use crate::domain::accrual::{AccrualReply, AccrualSource};
use crate::domain::repository::AccrualRepository;
use crate::error::LoyaltyResult;

/// Default pause between reconciliation passes
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Background reconciliation loop
pub struct AccrualPoller<R, C>
where
    R: AccrualRepository,
    C: AccrualSource,
{
    repo: R,
    client: C,
    interval: Duration,
}

impl<R, C> AccrualPoller<R, C>
where
    R: AccrualRepository,
    C: AccrualSource,
{
    pub fn new(repo: R, client: C) -> Self {
        Self {
            repo,
            client,
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the shutdown channel flips to `true` (or closes)
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Accrual poller started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Accrual poller stopped");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Accrual poll pass failed");
                    }
                }
            }
        }
    }

    /// One reconciliation pass
    pub async fn tick(&self) -> LoyaltyResult<()> {
        let numbers = self.repo.poll_candidates().await?;
        if numbers.is_empty() {
            return Ok(());
        }

        let mut batch = Vec::new();

        for number in numbers {
            match self.client.order_status(number).await {
                Ok(AccrualReply::Ready(result)) => batch.push(result),
                Ok(AccrualReply::NotRegistered) => {}
                Ok(AccrualReply::Throttled { retry_after }) => {
                    // Throttles the rest of this tick as well; acceptable for
                    // a single-worker poller.
                    tracing::warn!(
                        order = number,
                        retry_after_secs = retry_after.as_secs(),
                        "Accrual service throttled us"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                Ok(AccrualReply::Unavailable) => {
                    tracing::error!(order = number, "Accrual service unavailable");
                }
                Err(e) => {
                    tracing::error!(order = number, error = %e, "Accrual query failed");
                }
            }
        }

        if !batch.is_empty() {
            tracing::debug!(results = batch.len(), "Persisting accrual batch");
            self.repo.save_results(&batch).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    use crate::domain::accrual::AccrualResult;
    use crate::domain::order::OrderStatus;
    use crate::error::LoyaltyError;

    /// Repository stub: fixed candidates, records every saved batch
    #[derive(Clone)]
    struct StubRepo {
        candidates: Vec<i64>,
        saved: Arc<Mutex<Vec<Vec<AccrualResult>>>>,
    }

    impl StubRepo {
        fn new(candidates: Vec<i64>) -> Self {
            Self {
                candidates,
                saved: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl AccrualRepository for StubRepo {
        async fn poll_candidates(&self) -> LoyaltyResult<Vec<i64>> {
            Ok(self.candidates.clone())
        }

        async fn save_results(&self, results: &[AccrualResult]) -> LoyaltyResult<()> {
            self.saved.lock().unwrap().push(results.to_vec());
            Ok(())
        }
    }

    /// Accrual-source stub with one scripted reply per order number
    struct StubSource {
        replies: HashMap<i64, AccrualReply>,
    }

    impl AccrualSource for StubSource {
        async fn order_status(&self, number: i64) -> LoyaltyResult<AccrualReply> {
            match self.replies.get(&number) {
                Some(reply) => Ok(reply.clone()),
                None => Err(LoyaltyError::Internal("connection refused".into())),
            }
        }
    }

    fn ready(order: &str, status: OrderStatus, accrual: Option<f64>) -> AccrualReply {
        AccrualReply::Ready(AccrualResult {
            order: order.to_string(),
            status,
            accrual,
        })
    }

    #[tokio::test]
    async fn test_tick_persists_parsed_verdicts() {
        let repo = StubRepo::new(vec![11, 22, 33]);
        let source = StubSource {
            replies: HashMap::from([
                (11, ready("11", OrderStatus::Processed, Some(10.0))),
                (22, AccrualReply::NotRegistered),
                (33, ready("33", OrderStatus::Processing, None)),
            ]),
        };

        let poller = AccrualPoller::new(repo.clone(), source);
        poller.tick().await.unwrap();

        let saved = repo.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        let batch = &saved[0];
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].order, "11");
        assert_eq!(batch[0].status, OrderStatus::Processed);
        assert_eq!(batch[0].accrual, Some(10.0));
        assert_eq!(batch[1].order, "33");
        assert!(!batch[1].status.is_terminal());
    }

    #[tokio::test]
    async fn test_tick_skips_failures_without_aborting() {
        // 55 has no scripted reply and errors out; 66 is a server error
        let repo = StubRepo::new(vec![55, 66, 77]);
        let source = StubSource {
            replies: HashMap::from([
                (66, AccrualReply::Unavailable),
                (77, ready("77", OrderStatus::Invalid, None)),
            ]),
        };

        let poller = AccrualPoller::new(repo.clone(), source);
        poller.tick().await.unwrap();

        let saved = repo.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].len(), 1);
        assert_eq!(saved[0][0].order, "77");
    }

    #[tokio::test]
    async fn test_tick_with_no_verdicts_saves_nothing() {
        let repo = StubRepo::new(vec![11]);
        let source = StubSource {
            replies: HashMap::from([(11, AccrualReply::NotRegistered)]),
        };

        let poller = AccrualPoller::new(repo.clone(), source);
        poller.tick().await.unwrap();

        assert!(repo.saved.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_delays_rest_of_tick() {
        let repo = StubRepo::new(vec![11, 22]);
        let source = StubSource {
            replies: HashMap::from([
                (
                    11,
                    AccrualReply::Throttled {
                        retry_after: Duration::from_secs(2),
                    },
                ),
                (22, ready("22", OrderStatus::Processed, Some(1.0))),
            ]),
        };

        let poller = AccrualPoller::new(repo.clone(), source);
        let started = Instant::now();
        poller.tick().await.unwrap();

        // The advertised back-off is honored before the next number
        assert!(started.elapsed() >= Duration::from_secs(2));

        let saved = repo.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        // The throttled number is not retried within the tick
        assert_eq!(saved[0].len(), 1);
        assert_eq!(saved[0][0].order, "22");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let repo = StubRepo::new(vec![]);
        let source = StubSource {
            replies: HashMap::new(),
        };
        let poller = AccrualPoller::new(repo, source).with_interval(Duration::from_millis(5));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
    }
}
