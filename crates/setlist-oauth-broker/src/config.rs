use std::{env, fmt, time::Duration};

use setlist_oauth_core::ProviderEndpoints;

use crate::exchange::RetryPolicy;

const ENV_CLIENT_ID: &str = "SETLIST_OAUTH_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "SETLIST_OAUTH_CLIENT_SECRET";
const ENV_AUTHORIZE_URL: &str = "SETLIST_OAUTH_AUTHORIZE_URL";
const ENV_TOKEN_URL: &str = "SETLIST_OAUTH_TOKEN_URL";
const ENV_TIMEOUT_SECS: &str = "SETLIST_OAUTH_TIMEOUT_SECS";
const ENV_REFRESH_MARGIN_SECS: &str = "SETLIST_OAUTH_REFRESH_MARGIN_SECS";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;
pub const DEFAULT_ATTEMPT_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_PENDING_ATTEMPTS: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Everything the coordinator needs to talk to one provider.
#[derive(Clone)]
pub struct BrokerConfig {
    pub client_id: String,
    pub client_secret: String,
    pub endpoints: ProviderEndpoints,
    pub request_timeout: Duration,
    pub refresh_margin_secs: u64,
    pub attempt_ttl: Duration,
    pub max_pending_attempts: usize,
    pub retry: RetryPolicy,
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("client_id", &self.client_id)
            .field("endpoints", &self.endpoints)
            .field("request_timeout", &self.request_timeout)
            .field("refresh_margin_secs", &self.refresh_margin_secs)
            .finish_non_exhaustive()
    }
}

impl BrokerConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        endpoints: ProviderEndpoints,
    ) -> Result<Self, ConfigError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "missing client credentials".to_string(),
            ));
        }
        Ok(Self {
            client_id,
            client_secret,
            endpoints,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            attempt_ttl: DEFAULT_ATTEMPT_TTL,
            max_pending_attempts: DEFAULT_MAX_PENDING_ATTEMPTS,
            retry: RetryPolicy::default(),
        })
    }

    /// Load configuration from the environment, failing fast on anything
    /// the surrounding service cannot start without.
    ///
    /// Endpoints default to the Spotify account service unless both
    /// override variables are present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = require_env(ENV_CLIENT_ID)?;
        let client_secret = require_env(ENV_CLIENT_SECRET)?;

        let endpoints = match (
            env::var(ENV_AUTHORIZE_URL).ok().filter(|v| !v.is_empty()),
            env::var(ENV_TOKEN_URL).ok().filter(|v| !v.is_empty()),
        ) {
            (Some(authorize), Some(token)) => ProviderEndpoints::new(&authorize, &token)
                .map_err(|err| ConfigError::InvalidConfig(err.to_string()))?,
            (None, None) => ProviderEndpoints::spotify(),
            _ => {
                return Err(ConfigError::InvalidConfig(format!(
                    "{ENV_AUTHORIZE_URL} and {ENV_TOKEN_URL} must be set together"
                )));
            }
        };

        let mut config = Self::new(client_id, client_secret, endpoints)?;
        if let Some(secs) = parse_env_u64(ENV_TIMEOUT_SECS) {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_env_u64(ENV_REFRESH_MARGIN_SECS) {
            config.refresh_margin_secs = secs;
        }
        Ok(config)
    }
}

fn require_env(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(key)),
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse::<u64>().ok())
}
