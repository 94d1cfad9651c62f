//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256 digests, CSPRNG key generation)
//! - Signed bearer-token codec (HMAC-SHA256 JWT)
//! - Cookie management

pub mod cookie;
pub mod crypto;
pub mod token;
