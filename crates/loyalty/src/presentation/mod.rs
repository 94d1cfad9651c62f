//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::LoyaltyAppState;
pub use middleware::{access_log, gzip_codec};
pub use router::{user_router, user_router_generic};
