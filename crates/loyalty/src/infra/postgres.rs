//! PostgreSQL Repository Implementations
//!
//! One `PgLoyaltyRepository` implements every storage port. Unique and CHECK
//! violations are the signals the domain-error mapping is built on: a
//! duplicate login or order number surfaces as the matching conflict kind,
//! and the `current >= 0` constraint turning a debit away surfaces as
//! `NotEnough`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::accrual::AccrualResult;
use crate::domain::balance::Balance;
use crate::domain::credentials::Credentials;
use crate::domain::order::{LoyaltyOrder, OrderStatus, Withdrawal};
use crate::domain::order_number::OrderNumber;
use crate::domain::repository::{
    AccrualRepository, BalanceRepository, OrderRepository, SecurityRepository, UserRepository,
};
use crate::error::{LoyaltyError, LoyaltyResult};

/// PostgreSQL-backed loyalty repository
#[derive(Clone)]
pub struct PgLoyaltyRepository {
    pool: PgPool,
}

impl PgLoyaltyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn order_owner(&self, number: i64) -> LoyaltyResult<i64> {
        let owner = sqlx::query_scalar::<_, i64>("SELECT userid FROM orders WHERE number = $1")
            .bind(number)
            .fetch_one(&self.pool)
            .await?;

        Ok(owner)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_check_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_check_violation())
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgLoyaltyRepository {
    async fn register_user(&self, creds: &Credentials) -> LoyaltyResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (login, password) VALUES ($1, $2) RETURNING id",
        )
        .bind(&creds.login)
        .bind(platform::crypto::password_digest(&creds.password))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LoyaltyError::AlreadyExists
            } else {
                e.into()
            }
        })?;

        tracing::info!(user_id = id, "User registered");

        Ok(id)
    }

    async fn auth_user(&self, creds: &Credentials) -> LoyaltyResult<i64> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, password FROM users WHERE login = $1",
        )
        .bind(&creds.login)
        .fetch_optional(&self.pool)
        .await?;

        // Missing account and wrong password produce the same signal
        match row {
            Some((id, digest)) if platform::crypto::password_digest(&creds.password) == digest => {
                Ok(id)
            }
            _ => Err(LoyaltyError::NotExists),
        }
    }
}

// ============================================================================
// Order Repository Implementation
// ============================================================================

impl OrderRepository for PgLoyaltyRepository {
    async fn create_order(&self, user_id: i64, number: OrderNumber) -> LoyaltyResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (userid, number, uploaded_at, processable, processed, status)
            VALUES ($1, $2, $3, true, false, 'NEW')
            "#,
        )
        .bind(user_id)
        .bind(number.get())
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                if self.order_owner(number.get()).await? == user_id {
                    Err(LoyaltyError::OrderAlreadyExists)
                } else {
                    Err(LoyaltyError::OtherOrderAlreadyExists)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_orders(&self, user_id: i64) -> LoyaltyResult<Vec<LoyaltyOrder>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT number, uploaded_at, status, accrual
            FROM orders
            WHERE userid = $1 AND processable = true
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(LoyaltyError::EmptyData);
        }

        rows.into_iter().map(|r| r.into_order()).collect()
    }
}

// ============================================================================
// Balance Repository Implementation
// ============================================================================

impl BalanceRepository for PgLoyaltyRepository {
    async fn get_balance(&self, user_id: i64) -> LoyaltyResult<Balance> {
        let row = sqlx::query_as::<_, (f64, f64)>(
            "SELECT current, withdrawn FROM balance WHERE userid = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        // No row yet means nothing has been credited: zero on both sides
        Ok(row
            .map(|(current, withdrawn)| Balance { current, withdrawn })
            .unwrap_or_default())
    }

    async fn withdraw(&self, user_id: i64, order: OrderNumber, sum: f64) -> LoyaltyResult<()> {
        let mut tx = self.pool.begin().await?;

        let debit = sqlx::query(
            r#"
            UPDATE balance
            SET current = current - $1, withdrawn = withdrawn + $1
            WHERE userid = $2
            "#,
        )
        .bind(sum)
        .bind(user_id)
        .execute(&mut *tx)
        .await;

        // Zero rows (no balance yet) and a CHECK violation (would go
        // negative) both mean the account cannot cover the sum.
        match debit {
            Ok(done) if done.rows_affected() == 0 => return Err(LoyaltyError::NotEnough),
            Ok(_) => {}
            Err(e) if is_check_violation(&e) => return Err(LoyaltyError::NotEnough),
            Err(e) => return Err(e.into()),
        }

        sqlx::query(
            r#"
            INSERT INTO orders (userid, number, sum, processed_at, processable, processed)
            VALUES ($1, $2, $3, $4, false, true)
            "#,
        )
        .bind(user_id)
        .bind(order.get())
        .bind(sum)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LoyaltyError::OrderAlreadyExists
            } else {
                LoyaltyError::from(e)
            }
        })?;

        tx.commit().await?;

        tracing::info!(user_id, order = order.get(), "Withdrawal recorded");

        Ok(())
    }

    async fn list_withdrawals(&self, user_id: i64) -> LoyaltyResult<Vec<Withdrawal>> {
        let rows = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            SELECT number, sum, processed_at
            FROM orders
            WHERE userid = $1 AND processable = false
            ORDER BY processed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(LoyaltyError::EmptyData);
        }

        Ok(rows.into_iter().map(|r| r.into_withdrawal()).collect())
    }
}

// ============================================================================
// Accrual Repository Implementation
// ============================================================================

impl AccrualRepository for PgLoyaltyRepository {
    async fn poll_candidates(&self) -> LoyaltyResult<Vec<i64>> {
        let numbers = sqlx::query_scalar::<_, i64>(
            "SELECT number FROM orders WHERE processable = true AND processed = false",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(numbers)
    }

    async fn save_results(&self, results: &[AccrualResult]) -> LoyaltyResult<()> {
        let mut tx = self.pool.begin().await?;

        for result in results {
            let number: i64 = match result.order.parse() {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(order = %result.order, error = %e, "Bad order number in accrual result");
                    continue;
                }
            };

            sqlx::query("UPDATE orders SET status = $1, accrual = $2, processed = $3 WHERE number = $4")
                .bind(result.status.as_str())
                .bind(result.accrual)
                .bind(result.status.is_terminal())
                .bind(number)
                .execute(&mut *tx)
                .await?;

            // Terminal success also credits the owner's balance. An absent
            // accrual amount is stored as NULL and credits nothing.
            if result.status == OrderStatus::Processed {
                if let Some(points) = result.accrual {
                    let owner = sqlx::query_scalar::<_, i64>(
                        "SELECT userid FROM orders WHERE number = $1",
                    )
                    .bind(number)
                    .fetch_one(&mut *tx)
                    .await?;

                    sqlx::query(
                        r#"
                        INSERT INTO balance (userid, current, withdrawn)
                        VALUES ($2, $1, 0)
                        ON CONFLICT (userid) DO UPDATE SET current = balance.current + $1
                        "#,
                    )
                    .bind(points)
                    .bind(owner)
                    .execute(&mut *tx)
                    .await?;

                    tracing::info!(order = number, user_id = owner, points, "Accrual credited");
                }
            }
        }

        tx.commit().await?;

        Ok(())
    }
}

// ============================================================================
// Security Repository Implementation
// ============================================================================

impl SecurityRepository for PgLoyaltyRepository {
    async fn init_secret_key(&self) -> LoyaltyResult<()> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(id) FROM security")
            .fetch_one(&self.pool)
            .await?;

        if count == 0 {
            sqlx::query("INSERT INTO security (seckey) VALUES ($1)")
                .bind(platform::crypto::generate_key_hex())
                .execute(&self.pool)
                .await?;

            tracing::info!("Token signing secret generated");
        }

        Ok(())
    }

    async fn get_secret_key(&self) -> LoyaltyResult<String> {
        let seckey = sqlx::query_scalar::<_, String>("SELECT seckey FROM security")
            .fetch_one(&self.pool)
            .await?;

        Ok(seckey)
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct OrderRow {
    number: i64,
    uploaded_at: DateTime<Utc>,
    status: String,
    accrual: Option<f64>,
}

impl OrderRow {
    fn into_order(self) -> LoyaltyResult<LoyaltyOrder> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(LoyaltyError::Internal)?;

        Ok(LoyaltyOrder {
            number: self.number,
            status,
            accrual: self.accrual,
            uploaded_at: self.uploaded_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WithdrawalRow {
    number: i64,
    sum: f64,
    processed_at: DateTime<Utc>,
}

impl WithdrawalRow {
    fn into_withdrawal(self) -> Withdrawal {
        Withdrawal {
            order: self.number,
            sum: self.sum,
            processed_at: self.processed_at,
        }
    }
}
