//! HTTP Handlers
//!
//! Seven endpoints under `/api/user`. Each one checks the Content-Type when
//! it accepts a body, resolves the bearer token when it requires auth, and
//! reaches storage only through the retry envelope.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use platform::cookie::CookieConfig;

use crate::application::retry::RetryPolicy;
use crate::domain::credentials::Credentials;
use crate::domain::order_number::OrderNumber;
use crate::domain::repository::{BalanceRepository, OrderRepository, UserRepository};
use crate::error::{LoyaltyError, LoyaltyResult};
use crate::presentation::dto::{
    BalanceResponse, OrderResponse, WithdrawRequest, WithdrawalResponse,
};

/// Cookie lifetime for issued tokens, matching the token TTL (12 hours)
const COOKIE_MAX_AGE_SECS: i64 = 43200;

const BEARER_COOKIE: &str = "Bearer";

/// Shared state for the user-facing handlers
#[derive(Clone)]
pub struct LoyaltyAppState<R>
where
    R: UserRepository + OrderRepository + BalanceRepository + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub secret: Arc<String>,
    pub retry: RetryPolicy,
}

// ============================================================================
// Register / Login
// ============================================================================

/// POST /api/user/register
pub async fn register<R>(
    State(state): State<LoyaltyAppState<R>>,
    headers: HeaderMap,
    body: String,
) -> LoyaltyResult<Response>
where
    R: UserRepository + OrderRepository + BalanceRepository + Clone + Send + Sync + 'static,
{
    check_content_type(&headers, "application/json")?;
    let creds = parse_credentials(&body)?;

    let user_id = state.retry.run(|| state.repo.register_user(&creds)).await?;

    token_response(user_id, &state.secret)
}

/// POST /api/user/login
pub async fn login<R>(
    State(state): State<LoyaltyAppState<R>>,
    headers: HeaderMap,
    body: String,
) -> LoyaltyResult<Response>
where
    R: UserRepository + OrderRepository + BalanceRepository + Clone + Send + Sync + 'static,
{
    check_content_type(&headers, "application/json")?;
    let creds = parse_credentials(&body)?;

    let user_id = state.retry.run(|| state.repo.auth_user(&creds)).await?;

    token_response(user_id, &state.secret)
}

// ============================================================================
// Orders
// ============================================================================

/// POST /api/user/orders
pub async fn submit_order<R>(
    State(state): State<LoyaltyAppState<R>>,
    headers: HeaderMap,
    body: String,
) -> LoyaltyResult<Response>
where
    R: UserRepository + OrderRepository + BalanceRepository + Clone + Send + Sync + 'static,
{
    check_content_type(&headers, "text/plain")?;
    let user_id = authorize(&headers, &state.secret)?;

    let number = OrderNumber::parse(&body)?;

    match state
        .retry
        .run(|| state.repo.create_order(user_id, number))
        .await
    {
        // Resubmission by the same account is not an error to the client
        Err(LoyaltyError::OrderAlreadyExists) => {
            Ok((StatusCode::OK, number.to_string()).into_response())
        }
        Err(e) => Err(e),
        Ok(()) => Ok((StatusCode::ACCEPTED, number.to_string()).into_response()),
    }
}

/// GET /api/user/orders
pub async fn list_orders<R>(
    State(state): State<LoyaltyAppState<R>>,
    headers: HeaderMap,
) -> LoyaltyResult<Json<Vec<OrderResponse>>>
where
    R: UserRepository + OrderRepository + BalanceRepository + Clone + Send + Sync + 'static,
{
    let user_id = authorize(&headers, &state.secret)?;

    let orders = state.retry.run(|| state.repo.list_orders(user_id)).await?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

// ============================================================================
// Balance / Withdrawals
// ============================================================================

/// GET /api/user/balance
pub async fn get_balance<R>(
    State(state): State<LoyaltyAppState<R>>,
    headers: HeaderMap,
) -> LoyaltyResult<Json<BalanceResponse>>
where
    R: UserRepository + OrderRepository + BalanceRepository + Clone + Send + Sync + 'static,
{
    let user_id = authorize(&headers, &state.secret)?;

    let balance = state.retry.run(|| state.repo.get_balance(user_id)).await?;

    Ok(Json(balance.into()))
}

/// POST /api/user/balance/withdraw
pub async fn withdraw<R>(
    State(state): State<LoyaltyAppState<R>>,
    headers: HeaderMap,
    body: String,
) -> LoyaltyResult<StatusCode>
where
    R: UserRepository + OrderRepository + BalanceRepository + Clone + Send + Sync + 'static,
{
    check_content_type(&headers, "application/json")?;
    let user_id = authorize(&headers, &state.secret)?;

    let req: WithdrawRequest =
        serde_json::from_str(&body).map_err(|_| LoyaltyError::JsonParse)?;

    let order = OrderNumber::parse(&req.order).map_err(|e| match e {
        LoyaltyError::OrderNotNumeric => LoyaltyError::WithdrawOrderInvalid,
        other => other,
    })?;
    if req.sum <= 0.0 {
        return Err(LoyaltyError::InvalidSum);
    }

    state
        .retry
        .run(|| state.repo.withdraw(user_id, order, req.sum))
        .await?;

    Ok(StatusCode::OK)
}

/// GET /api/user/withdrawals
pub async fn list_withdrawals<R>(
    State(state): State<LoyaltyAppState<R>>,
    headers: HeaderMap,
) -> LoyaltyResult<Json<Vec<WithdrawalResponse>>>
where
    R: UserRepository + OrderRepository + BalanceRepository + Clone + Send + Sync + 'static,
{
    let user_id = authorize(&headers, &state.secret)?;

    let withdrawals = state
        .retry
        .run(|| state.repo.list_withdrawals(user_id))
        .await?;

    Ok(Json(
        withdrawals.into_iter().map(WithdrawalResponse::from).collect(),
    ))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Pull the bearer token out of the request: `Bearer` cookie first, then the
/// `Authorization: Bearer <tok>` header
fn extract_bearer(headers: &HeaderMap) -> LoyaltyResult<String> {
    if let Some(token) = platform::cookie::extract_cookie(headers, BEARER_COOKIE) {
        return Ok(token);
    }

    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some((scheme, token)) = value.split_once(' ') {
            if scheme == "Bearer" && !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }

    Err(LoyaltyError::AuthCredsNotFound)
}

/// Resolve the request to an account id, or 401
fn authorize(headers: &HeaderMap, secret: &str) -> LoyaltyResult<i64> {
    let token = extract_bearer(headers)?;
    Ok(platform::token::verify(&token, secret)?)
}

fn check_content_type(headers: &HeaderMap, expected: &str) -> LoyaltyResult<()> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    if content_type != Some(expected) {
        return Err(LoyaltyError::ContentType);
    }
    Ok(())
}

fn parse_credentials(body: &str) -> LoyaltyResult<Credentials> {
    let creds: Credentials =
        serde_json::from_str(body).map_err(|_| LoyaltyError::JsonParse)?;
    creds.validate()?;
    Ok(creds)
}

/// Issue a fresh token, set it as the `Bearer` cookie and echo it as the body
fn token_response(user_id: i64, secret: &str) -> LoyaltyResult<Response> {
    let token = platform::token::issue(user_id, secret)?;

    let cookie = CookieConfig {
        name: BEARER_COOKIE.to_string(),
        http_only: false,
        path: "/".to_string(),
        max_age_secs: Some(COOKIE_MAX_AGE_SECS),
    }
    .build_set_cookie(&token);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        token,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("Bearer=fromcookie"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer fromheader"),
        );

        assert_eq!(extract_bearer(&headers).unwrap(), "fromcookie");
    }

    #[test]
    fn test_extract_bearer_header_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer fromheader"),
        );

        assert_eq!(extract_bearer(&headers).unwrap(), "fromheader");
    }

    #[test]
    fn test_extract_bearer_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );

        assert!(matches!(
            extract_bearer(&headers),
            Err(LoyaltyError::AuthCredsNotFound)
        ));
    }

    #[test]
    fn test_extract_bearer_missing() {
        let headers = HeaderMap::new();
        assert!(matches!(
            extract_bearer(&headers),
            Err(LoyaltyError::AuthCredsNotFound)
        ));
    }

    #[test]
    fn test_check_content_type_exact_match() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        assert!(check_content_type(&headers, "application/json").is_ok());
        assert!(matches!(
            check_content_type(&headers, "text/plain"),
            Err(LoyaltyError::ContentType)
        ));
    }

    #[test]
    fn test_parse_credentials() {
        let creds = parse_credentials(r#"{"login": "test", "password": "testok"}"#).unwrap();
        assert_eq!(creds.login, "test");
        assert_eq!(creds.password, "testok");

        assert!(matches!(
            parse_credentials(r#"{"login": "test", "password":"#),
            Err(LoyaltyError::JsonParse)
        ));
        assert!(matches!(
            parse_credentials(r#"{"login": "", "password": "qwe"}"#),
            Err(LoyaltyError::ValidateLogPass)
        ));
        assert!(matches!(
            parse_credentials(r#"{"login": "qwe", "password": ""}"#),
            Err(LoyaltyError::ValidateLogPass)
        ));
    }

    #[test]
    fn test_token_response_sets_cookie() {
        let response = token_response(100, "test-secret").unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(cookie.starts_with("Bearer="));
        assert!(cookie.contains("Max-Age=43200"));
    }
}
