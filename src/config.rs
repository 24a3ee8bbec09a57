//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DARAJA_CONSUMER_KEY` - Daraja app consumer key
//! - `DARAJA_CONSUMER_SECRET` - Daraja app consumer secret
//! - `DARAJA_PASSKEY` - Lipa na M-Pesa online passkey
//! - `DARAJA_SHORTCODE` - Paybill / till business short code
//! - `DARAJA_CALLBACK_URL` - Public URL of `POST /payments/mpesa/callback`
//!
//! ## Optional
//! - `BIND_ADDR` - Listen address (default: 127.0.0.1:8080)
//! - `DARAJA_BASE_URL` - Daraja API root (default: sandbox)
//! - `STORE_TIMEOUT_SECS` - Bound on one store round trip (default: 10)
//! - `GATEWAY_TIMEOUT_SECS` - Bound on one gateway call (default: 15)
//! - `PENDING_PAYMENT_TTL_SECS` - Age at which unpaid orders are cancelled (default: 900)
//! - `SWEEP_INTERVAL_SECS` - Stale order sweep period (default: 60)
//! - `CATALOG_SEED_PATH` - JSON file of products loaded at startup

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::gateway::daraja::SANDBOX_BASE_URL;
use crate::gateway::DarajaConfig;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PENDING_PAYMENT_TTL_SECS: u64 = 900;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store_timeout: Duration,
    pub gateway_timeout: Duration,
    pub pending_payment_ttl: Duration,
    pub sweep_interval: Duration,
    pub catalog_seed_path: Option<PathBuf>,
    pub daraja: DarajaConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let bind_addr = env
            .or_default("BIND_ADDR", DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("BIND_ADDR".to_string(), e.to_string()))?;
        let gateway_timeout = env.seconds("GATEWAY_TIMEOUT_SECS", DEFAULT_GATEWAY_TIMEOUT_SECS)?;

        let daraja = DarajaConfig {
            base_url: env.or_default("DARAJA_BASE_URL", SANDBOX_BASE_URL),
            consumer_key: env.required("DARAJA_CONSUMER_KEY")?,
            consumer_secret: env.secret("DARAJA_CONSUMER_SECRET")?,
            passkey: env.secret("DARAJA_PASSKEY")?,
            shortcode: env.required("DARAJA_SHORTCODE")?,
            callback_url: env.required("DARAJA_CALLBACK_URL")?,
            timeout: gateway_timeout,
        };

        Ok(Self {
            bind_addr,
            store_timeout: env.seconds("STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS)?,
            gateway_timeout,
            pending_payment_ttl: env.seconds("PENDING_PAYMENT_TTL_SECS", DEFAULT_PENDING_PAYMENT_TTL_SECS)?,
            sweep_interval: env.seconds("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?,
            catalog_seed_path: env.optional("CATALOG_SEED_PATH").map(PathBuf::from),
            daraja,
        })
    }
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Unset and blank values are treated alike.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        self.required(key).map(SecretString::from)
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn seconds(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        let Some(raw) = self.optional(key) else {
            return Ok(Duration::from_secs(default));
        };
        match raw.trim().parse::<u64>() {
            Ok(0) => Err(ConfigError::InvalidEnvVar(key.to_string(), "must be greater than zero".to_string())),
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        }
    }
}
