//! Process Configuration
//!
//! Command-line flags with environment-variable fallbacks. A malformed bind
//! address or accrual URL is a fatal startup error.

use anyhow::{Context, bail};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "api")]
#[command(about = "Loyalty-points service: order accrual and withdrawals")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Config {
    /// HTTP bind address, host:port
    #[arg(
        short = 'a',
        long = "address",
        env = "RUN_ADDRESS",
        default_value = "localhost:8080"
    )]
    pub run_address: String,

    /// PostgreSQL connection URI
    #[arg(
        short = 'd',
        long = "database-uri",
        env = "DATABASE_URI",
        default_value = "postgres://localhost/loyalty"
    )]
    pub database_uri: String,

    /// Accrual calculator base URL (scheme and host required)
    #[arg(short = 'r', long = "accrual-address", env = "ACCRUAL_SYSTEM_ADDRESS")]
    pub accrual_address: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let (host, port) = self
            .run_address
            .rsplit_once(':')
            .context("run address must be host:port")?;
        if host.is_empty() {
            bail!("run address must have a host");
        }
        port.parse::<u16>()
            .context("run address must have a numeric port")?;

        let url = reqwest::Url::parse(&self.accrual_address)
            .context("accrual address is not a valid URL")?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            bail!("accrual address must be an http(s) URL with a host");
        }

        Ok(())
    }

    /// Accrual base URL without a trailing slash, ready for path appends
    pub fn accrual_base(&self) -> String {
        self.accrual_address.trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(run: &str, accrual: &str) -> Config {
        Config {
            run_address: run.to_string(),
            database_uri: "postgres://localhost/loyalty".to_string(),
            accrual_address: accrual.to_string(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(config("localhost:8080", "http://localhost:8081").validate().is_ok());
        assert!(config("0.0.0.0:80", "https://accrual.internal").validate().is_ok());
    }

    #[test]
    fn test_invalid_run_address() {
        assert!(config("localhost", "http://localhost:8081").validate().is_err());
        assert!(config(":8080", "http://localhost:8081").validate().is_err());
        assert!(config("localhost:eighty", "http://localhost:8081").validate().is_err());
    }

    #[test]
    fn test_invalid_accrual_address() {
        assert!(config("localhost:8080", "").validate().is_err());
        assert!(config("localhost:8080", "accrual.internal").validate().is_err());
        assert!(config("localhost:8080", "ftp://accrual.internal").validate().is_err());
    }

    #[test]
    fn test_accrual_base_strips_trailing_slash() {
        assert_eq!(
            config("localhost:8080", "http://localhost:8081/").accrual_base(),
            "http://localhost:8081"
        );
    }

    #[test]
    fn test_flag_parsing() {
        let config = Config::try_parse_from([
            "api",
            "-a",
            "127.0.0.1:9090",
            "-d",
            "postgres://db/points",
            "-r",
            "http://localhost:8081",
        ])
        .unwrap();

        assert_eq!(config.run_address, "127.0.0.1:9090");
        assert_eq!(config.database_uri, "postgres://db/points");
        assert_eq!(config.accrual_address, "http://localhost:8081");
    }
}
