//! Daraja (M-Pesa) STK push client.
//!
//! Obtains an OAuth bearer token with the consumer key and secret, caches it
//! until shortly before it expires, and submits signed push-payment requests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{GatewayError, PaymentGateway};
use crate::domain::GatewayCorrelation;

pub const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";

/// Seconds before expiry at which a cached token is no longer used.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Daraja credentials and endpoints.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct DarajaConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: SecretString,
    pub passkey: SecretString,
    pub shortcode: String,
    pub callback_url: String,
    pub timeout: Duration,
}

impl fmt::Debug for DarajaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DarajaConfig")
            .field("base_url", &self.base_url)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("passkey", &"[REDACTED]")
            .field("shortcode", &self.shortcode)
            .field("callback_url", &self.callback_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
struct AccessToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - chrono::Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS)
    }
}

/// Daraja reports `expires_in` as a string; accept a number as well.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Number(i64),
    Text(String),
}

impl ExpiresIn {
    fn seconds(&self) -> Result<i64, GatewayError> {
        match self {
            Self::Number(secs) => Ok(*secs),
            Self::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| GatewayError::AuthFailure(format!("invalid expires_in: {text}"))),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: ExpiresIn,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushRequest<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: u64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    call_back_url: &'a str,
    account_reference: &'a str,
    transaction_desc: &'static str,
}

#[derive(Deserialize)]
struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    response_description: Option<String>,
}

#[derive(Deserialize)]
struct DarajaErrorResponse {
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

/// `YYYYMMDDHHMMSS`, the request timestamp format the password is keyed on.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// base64(shortcode + passkey + timestamp).
pub fn password(shortcode: &str, passkey: &SecretString, timestamp: &str) -> String {
    BASE64_STANDARD.encode(format!("{shortcode}{}{timestamp}", passkey.expose_secret()))
}

pub struct DarajaGateway {
    http: reqwest::Client,
    config: DarajaConfig,
    token: Mutex<Option<AccessToken>>,
}

impl DarajaGateway {
    pub fn new(config: DarajaConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    /// Returns the cached bearer token, fetching a new one if it is missing or stale.
    async fn access_token(&self) -> Result<SecretString, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }
        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    #[instrument(skip(self))]
    async fn fetch_token(&self) -> Result<AccessToken, GatewayError> {
        debug!("Fetching gateway access token");
        let now = Utc::now();
        let response = self
            .http
            .get(format!("{}/oauth/v1/generate", self.config.base_url))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.config.consumer_key, Some(self.config.consumer_secret.expose_secret()))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: TokenResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::AuthFailure(format!("malformed token response: {e}")))?;
            let expires_in = body.expires_in.seconds()?;
            info!(expires_in, "Gateway access token refreshed");
            return Ok(AccessToken {
                value: SecretString::from(body.access_token),
                expires_at: now + chrono::Duration::seconds(expires_in),
            });
        }

        let text = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(GatewayError::Transport(format!("token endpoint HTTP {status}: {text}")))
        } else {
            Err(GatewayError::AuthFailure(format!("HTTP {status}: {text}")))
        }
    }

    async fn post_push(&self, token: &SecretString, request: &StkPushRequest<'_>) -> Result<reqwest::Response, GatewayError> {
        Ok(self
            .http
            .post(format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url))
            .bearer_auth(token.expose_secret())
            .json(request)
            .send()
            .await?)
    }
}

#[async_trait]
impl PaymentGateway for DarajaGateway {
    #[instrument(skip(self, phone))]
    async fn initiate(&self, phone: &str, amount: u64, order_reference: &str) -> Result<GatewayCorrelation, GatewayError> {
        let timestamp = timestamp(Utc::now());
        let shortcode = self.config.shortcode.as_str();
        let request = StkPushRequest {
            business_short_code: shortcode,
            password: password(shortcode, &self.config.passkey, &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount,
            party_a: phone,
            party_b: shortcode,
            phone_number: phone,
            call_back_url: &self.config.callback_url,
            account_reference: order_reference,
            transaction_desc: "Payment for order",
        };

        let token = self.access_token().await?;
        let mut response = self.post_push(&token, &request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Gateway rejected cached token, refreshing");
            self.invalidate_token().await;
            let token = self.access_token().await?;
            response = self.post_push(&token, &request).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(GatewayError::AuthFailure("push request unauthorized after token refresh".to_string()));
            }
        }

        let status = response.status();
        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Transport(format!("HTTP {status}: {text}")));
        }
        if !status.is_success() {
            let detail = match response.json::<DarajaErrorResponse>().await {
                Ok(body) => format!(
                    "{}: {}",
                    body.error_code.unwrap_or_else(|| status.to_string()),
                    body.error_message.unwrap_or_default()
                ),
                Err(_) => format!("HTTP {status}"),
            };
            return Err(GatewayError::Rejected(detail));
        }

        let body: StkPushResponse = response.json().await?;
        if body.response_code != "0" {
            return Err(GatewayError::Rejected(format!(
                "response code {}: {}",
                body.response_code,
                body.response_description.unwrap_or_default()
            )));
        }
        info!(checkout_request_id = %body.checkout_request_id, "STK push accepted");
        Ok(GatewayCorrelation {
            merchant_request_id: body.merchant_request_id,
            checkout_request_id: body.checkout_request_id,
        })
    }
}
