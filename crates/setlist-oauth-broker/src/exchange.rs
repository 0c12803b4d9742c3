use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use reqwest::StatusCode;
use serde::Deserialize;
use setlist_oauth_core::{AuthError, TokenRecord, TokenResponse};
use url::Url;

use crate::config::BrokerConfig;

/// Grant kinds accepted by the provider's token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    AuthorizationCode,
    Refresh,
}

/// Bounded exponential backoff with jitter, applied to refresh retries only.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Jitter factor (0.0 to 1.0) applied on top of the base delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let jitter = base * self.jitter * rand::rng().random_range(0.0..1.0);
        let delay = (base + jitter).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(delay.max(0.0))
    }
}

/// Client for the provider's token endpoint.
///
/// Client credentials travel via HTTP Basic auth, never in the form body,
/// so captured request bodies cannot leak the secret.
#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_endpoint: Url,
    client_id: String,
    client_secret: String,
    retry: RetryPolicy,
}

impl TokenClient {
    pub fn new(config: &BrokerConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| AuthError::InvalidConfig(format!("http client: {err}")))?;
        Ok(Self {
            http,
            token_endpoint: config.endpoints.token.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Swap an authorization code for tokens.
    ///
    /// Never retried: codes are single-use, and a retry after a
    /// provider-side success would fail against an already-consumed code.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenRecord, AuthError> {
        self.request(
            Grant::AuthorizationCode,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ],
        )
        .await
    }

    /// Swap a refresh token for a fresh access token, retrying transient
    /// failures within the configured bound.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let mut attempt = 0u32;
        loop {
            match self.request(Grant::Refresh, &params).await {
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    tracing::debug!(
                        target: "oauth.refresh",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient token endpoint failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn request(
        &self,
        grant: Grant,
        params: &[(&str, &str)],
    ) -> Result<TokenRecord, AuthError> {
        let response = self
            .http
            .post(self.token_endpoint.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_status(grant, status, &body));
        }

        let payload: TokenResponse =
            serde_json::from_slice(&body).map_err(|err| AuthError::ProtocolViolation {
                detail: err.to_string(),
            })?;
        payload.into_record(epoch_seconds())
    }
}

fn transport_error(err: reqwest::Error) -> AuthError {
    let detail = if err.is_timeout() {
        "request timed out".to_owned()
    } else if err.is_connect() {
        "connection failed".to_owned()
    } else {
        format!("transport error: {err}")
    };
    AuthError::UpstreamUnavailable { detail }
}

/// Subset of an RFC 6749 error response worth keeping for diagnostics.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

fn classify_status(grant: Grant, status: StatusCode, body: &[u8]) -> AuthError {
    if status.is_server_error() {
        return AuthError::UpstreamUnavailable {
            detail: format!("token endpoint returned {status}"),
        };
    }
    let error = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error);
    tracing::debug!(
        target: "oauth.exchange",
        status = status.as_u16(),
        error = error.as_deref().unwrap_or("unknown"),
        "token endpoint rejected the grant"
    );
    if grant == Grant::Refresh && error.as_deref() == Some("invalid_grant") {
        return AuthError::RefreshTokenInvalid;
    }
    AuthError::ExchangeRejected {
        status: status.as_u16(),
        error,
    }
}

pub(crate) fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
