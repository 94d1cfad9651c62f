//! User API Router

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::application::retry::RetryPolicy;
use crate::domain::repository::{BalanceRepository, OrderRepository, UserRepository};
use crate::infra::postgres::PgLoyaltyRepository;
use crate::presentation::handlers::{self, LoyaltyAppState};
use crate::presentation::middleware::{access_log, gzip_codec};

/// Create the user router with the PostgreSQL repository
pub fn user_router(repo: PgLoyaltyRepository, secret: String, retry: RetryPolicy) -> Router {
    user_router_generic(repo, secret, retry)
}

/// Create a user router for any repository implementation
pub fn user_router_generic<R>(repo: R, secret: String, retry: RetryPolicy) -> Router
where
    R: UserRepository + OrderRepository + BalanceRepository + Clone + Send + Sync + 'static,
{
    let state = LoyaltyAppState {
        repo: Arc::new(repo),
        secret: Arc::new(secret),
        retry,
    };

    Router::new()
        .route("/api/user/register", post(handlers::register::<R>))
        .route("/api/user/login", post(handlers::login::<R>))
        .route(
            "/api/user/orders",
            post(handlers::submit_order::<R>).get(handlers::list_orders::<R>),
        )
        .route("/api/user/balance", get(handlers::get_balance::<R>))
        .route(
            "/api/user/balance/withdraw",
            post(handlers::withdraw::<R>),
        )
        .route(
            "/api/user/withdrawals",
            get(handlers::list_withdrawals::<R>),
        )
        // Last layer added runs first: logging wraps the gzip codec, so the
        // logged byte count is what actually went on the wire.
        .layer(axum::middleware::from_fn(gzip_codec))
        .layer(axum::middleware::from_fn(access_log))
        .with_state(state)
}
