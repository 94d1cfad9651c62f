//! Credentials Value Object

use serde::Deserialize;

use crate::error::{LoyaltyError, LoyaltyResult};

/// Login/password pair submitted on register and login
///
/// The password only ever crosses the storage boundary as a SHA-256 digest;
/// the raw value lives for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    /// Reject empty login or password
    pub fn validate(&self) -> LoyaltyResult<()> {
        if self.login.is_empty() || self.password.is_empty() {
            return Err(LoyaltyError::ValidateLogPass);
        }
        Ok(())
    }
}
