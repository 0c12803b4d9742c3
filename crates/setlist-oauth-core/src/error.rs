use thiserror::Error;

/// Convenience alias for flow operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Classified failure surface of the authorization coordinator.
///
/// Every variant is safe to show to the presentation layer: no client
/// secret, token material, or raw provider body ever lands in a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Client identity or redirect target missing/unusable at setup.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
    /// The user declined at the provider's consent screen.
    #[error("authorization declined at the provider: {reason}")]
    ConsentDenied { reason: String },
    /// State value unknown, expired, or already consumed (CSRF/replay defense).
    #[error("state value unknown, expired, or already consumed")]
    InvalidOrExpiredState,
    /// The provider rejected the grant outright (4xx on the token endpoint).
    #[error("token endpoint rejected the grant (http {status})")]
    ExchangeRejected { status: u16, error: Option<String> },
    /// The provider reports the refresh token itself revoked or expired.
    #[error("refresh token revoked or expired at the provider")]
    RefreshTokenInvalid,
    /// Network failure, timeout, or provider 5xx after retries were exhausted.
    #[error("token endpoint unavailable: {detail}")]
    UpstreamUnavailable { detail: String },
    /// A 2xx response that is not valid token material.
    #[error("malformed token endpoint response: {detail}")]
    ProtocolViolation { detail: String },
    /// No token on record for the requested key.
    #[error("no token on record for this key")]
    NotAuthorized,
    /// The stored credentials were revoked; only a fresh consent cycle helps.
    #[error("stored credentials revoked; a new authorization is required")]
    ReauthorizationRequired,
    /// The backing token store failed.
    #[error("token storage failure: {detail}")]
    Storage { detail: String },
}

impl AuthError {
    /// Errors worth retrying (refresh path only).
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::UpstreamUnavailable { .. })
    }
}
