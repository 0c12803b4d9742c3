use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Token material owned by the store for one authorized key.
///
/// This is the persistence-boundary shape: a durable store serializes
/// exactly these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    #[serde(default)]
    pub scope: BTreeSet<String>,
    /// Absolute expiry, seconds since the Unix epoch.
    pub expires_at: u64,
}

impl TokenRecord {
    /// True when the record expires within `margin_secs` of `now`.
    pub fn needs_refresh(&self, now: u64, margin_secs: u64) -> bool {
        self.expires_at.saturating_sub(now) <= margin_secs
    }
}

/// Raw token endpoint payload, before presence checks.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert the wire payload into an owned record anchored at `now`.
    ///
    /// `scope` arrives space-delimited per RFC 6749 and is split into the
    /// ordered set; a missing `token_type` defaults to `Bearer`.
    pub fn into_record(self, now: u64) -> Result<TokenRecord, AuthError> {
        if self.access_token.is_empty() {
            return Err(AuthError::ProtocolViolation {
                detail: "token response carried an empty access_token".into(),
            });
        }
        let scope = self
            .scope
            .map(|raw| raw.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();
        Ok(TokenRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_owned()),
            scope,
            expires_at: now.saturating_add(self.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS)),
        })
    }
}

/// Caller-facing view of a usable access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub token_type: String,
    pub expires_at: u64,
}

impl AccessToken {
    pub fn from_record(record: &TokenRecord) -> Self {
        Self {
            token: record.access_token.clone(),
            token_type: record.token_type.clone(),
            expires_at: record.expires_at,
        }
    }

    /// Value for an `Authorization` header on downstream API calls.
    pub fn bearer(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }
}
