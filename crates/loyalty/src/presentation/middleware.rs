//! HTTP Middleware
//!
//! Two `from_fn` layers applied to every route: structured access logging
//! (outermost, so it observes the bytes actually sent) and a conditional
//! gzip codec for request and response bodies.

use std::io::{Read, Write};
use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::http::{HeaderValue, Method, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Request Content-Types whose responses are worth compressing
const COMPRESSIBLE_TYPES: [&str; 2] = ["text/html", "application/json"];

// ============================================================================
// Access logging
// ============================================================================

/// Emit one structured record per request
pub async fn access_log(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let accept_encoding = req
        .headers()
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed();

    // Every inner layer hands back a buffered body, so re-buffering here to
    // count the bytes that go on the wire is cheap.
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();

    tracing::info!(
        method = %method,
        uri = %uri,
        duration_ms = duration.as_millis() as u64,
        status = parts.status.as_u16(),
        bytes = bytes.len(),
        accept_encoding = %accept_encoding,
        "request"
    );

    Response::from_parts(parts, Body::from(bytes))
}

// ============================================================================
// Gzip codec
// ============================================================================

/// Transparently inflate gzip request bodies and compress responses when the
/// client accepts gzip and the request is a GET or carries a compressible
/// Content-Type
pub async fn gzip_codec(req: Request<Body>, next: Next) -> Response {
    let headers = req.headers();

    let accepts_gzip = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"));
    let compressible_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| COMPRESSIBLE_TYPES.contains(&ct));
    let compress_response = accepts_gzip && (req.method() == Method::GET || compressible_type);

    let sends_gzip = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"));

    let req = if sends_gzip {
        match inflate_request(req).await {
            Ok(req) => req,
            Err(response) => return response,
        }
    } else {
        req
    };

    let response = next.run(req).await;

    if compress_response {
        deflate_response(response).await
    } else {
        response
    }
}

async fn inflate_request(req: Request<Body>) -> Result<Request<Body>, Response> {
    let (mut parts, body) = req.into_parts();

    let compressed = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())?;

    let mut inflated = Vec::new();
    GzDecoder::new(compressed.as_ref())
        .read_to_end(&mut inflated)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to inflate request body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })?;

    parts.headers.remove(header::CONTENT_ENCODING);
    parts.headers.remove(header::CONTENT_LENGTH);

    Ok(Request::from_parts(parts, Body::from(inflated)))
}

async fn deflate_response(response: Response) -> Response {
    let (mut parts, body) = response.into_parts();

    let plain = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // Nothing to compress; an empty 204 must stay empty.
    if plain.is_empty() {
        return Response::from_parts(parts, Body::empty());
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(&plain).is_err() {
        return Response::from_parts(parts, Body::from(plain));
    }
    let deflated = match encoder.finish() {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    parts
        .headers
        .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(deflated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::{get, post};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn echo_router() -> Router {
        Router::new()
            .route("/echo", post(|body: String| async move { body }))
            .route("/hello", get(|| async { "hello world, hello gzip" }))
            .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
            .layer(axum::middleware::from_fn(gzip_codec))
            .layer(axum::middleware::from_fn(access_log))
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_get_response_compressed_when_accepted() {
        let response = echo_router()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/hello")
                    .header(header::ACCEPT_ENCODING, "gzip")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(gunzip(&body), b"hello world, hello gzip");
    }

    #[tokio::test]
    async fn test_response_not_compressed_without_accept() {
        let response = echo_router()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/hello")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello world, hello gzip");
    }

    #[tokio::test]
    async fn test_post_compressed_only_for_allowed_content_types() {
        // text/plain POST: accepted encoding but not a compressible type
        let response = echo_router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/echo")
                    .header(header::ACCEPT_ENCODING, "gzip")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("12345678903"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());

        // application/json POST: compressible
        let response = echo_router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/echo")
                    .header(header::ACCEPT_ENCODING, "gzip")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"a":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(gunzip(&body), br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_gzip_request_body_inflated() {
        let response = echo_router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/echo")
                    .header(header::CONTENT_ENCODING, "gzip")
                    .body(Body::from(gzip(b"compressed payload")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"compressed payload");
    }

    #[tokio::test]
    async fn test_corrupt_gzip_request_is_500() {
        let response = echo_router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/echo")
                    .header(header::CONTENT_ENCODING, "gzip")
                    .body(Body::from("definitely not gzip"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_empty_body_stays_empty() {
        let response = echo_router()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/empty")
                    .header(header::ACCEPT_ENCODING, "gzip")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
