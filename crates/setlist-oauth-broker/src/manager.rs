use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::{Arc, Mutex},
    time::SystemTime,
};

use setlist_oauth_core::{AccessToken, AuthError, TokenRecord, build_authorize_url};
use tokio::sync::watch;
use url::Url;

use crate::{
    config::BrokerConfig,
    exchange::{TokenClient, epoch_seconds},
    state::{AttemptStore, AuthorizationAttempt, generate_state},
    store::TokenStore,
};

/// Outcome broadcast to every caller sharing one in-flight refresh.
type RefreshOutcome = Option<Result<TokenRecord, AuthError>>;

/// Observable lifecycle phase for a key.
///
/// The consent flow itself is attempt-scoped (no key exists until the
/// callback commits), so pending authorizations show up in
/// [`LifecycleManager::pending_attempts`] rather than here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthorized,
    Authorized,
    Refreshing,
    Revoked,
}

/// Parameters for starting a consent flow.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    pub force_consent: bool,
}

/// Redirect target plus the state value underpinning the pending attempt.
#[derive(Debug, Clone)]
pub struct BeginAuthorization {
    pub url: Url,
    pub state: String,
}

/// Query parameters the provider sends back to the redirect target.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Orchestrates the authorize → callback → exchange sequence and the
/// refreshable token lifecycle behind it.
pub struct LifecycleManager<T: TokenStore + 'static> {
    config: BrokerConfig,
    attempts: AttemptStore,
    exchange: TokenClient,
    store: Arc<T>,
    inflight: Arc<Mutex<HashMap<String, watch::Receiver<RefreshOutcome>>>>,
    revoked: Arc<Mutex<HashSet<String>>>,
}

impl<T: TokenStore + 'static> LifecycleManager<T> {
    pub fn new(config: BrokerConfig, store: Arc<T>) -> Result<Self, AuthError> {
        let exchange = TokenClient::new(&config)?;
        let attempts = AttemptStore::new(config.attempt_ttl, config.max_pending_attempts);
        Ok(Self {
            config,
            attempts,
            exchange,
            store,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            revoked: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Start a consent flow: record a pending attempt, hand back the URL.
    ///
    /// Existing tokens are left untouched; invalidation is an explicit,
    /// separate operation.
    pub fn begin_authorization(
        &self,
        request: AuthorizeRequest,
    ) -> Result<BeginAuthorization, AuthError> {
        let state = generate_state();
        let url = build_authorize_url(
            &self.config.endpoints.authorize,
            &self.config.client_id,
            &request.redirect_uri,
            &request.scopes,
            &state,
            request.force_consent,
        )?;
        self.attempts.insert(AuthorizationAttempt {
            state: state.clone(),
            created_at: SystemTime::now(),
            redirect_uri: request.redirect_uri,
            scopes: request.scopes,
            force_consent: request.force_consent,
        });
        tracing::debug!(
            target: "oauth.flow",
            pending = self.attempts.pending(),
            "authorization attempt recorded"
        );
        Ok(BeginAuthorization { url, state })
    }

    /// Validate the provider callback and commit tokens under `key`.
    ///
    /// A provider-reported error never reaches the token endpoint; the
    /// retry decision belongs to the presentation layer, not this core.
    pub async fn complete_authorization(
        &self,
        key: &str,
        callback: CallbackParams,
    ) -> Result<(), AuthError> {
        if let Some(reason) = callback.error {
            if let Some(state) = callback.state {
                let _ = self.attempts.claim(&state);
            }
            tracing::warn!(
                target: "oauth.flow",
                reason = %reason,
                "provider reported an authorization error"
            );
            return Err(AuthError::ConsentDenied { reason });
        }

        let state = callback.state.ok_or(AuthError::InvalidOrExpiredState)?;
        let attempt = self
            .attempts
            .claim(&state)
            .ok_or(AuthError::InvalidOrExpiredState)?;
        let code = callback.code.ok_or_else(|| AuthError::ProtocolViolation {
            detail: "callback carried neither code nor error".into(),
        })?;

        let record = self.exchange.exchange_code(&code, &attempt.redirect_uri).await?;
        self.store.put(key, record).map_err(storage_error)?;
        self.revoked
            .lock()
            .expect("revocation set poisoned")
            .remove(key);
        tracing::info!(target: "oauth.flow", key, "authorization completed");
        Ok(())
    }

    /// Current access token for `key`, transparently refreshed near expiry.
    ///
    /// The fast path is lock-free of network concerns: a record more than
    /// the safety margin away from expiry is returned as-is.
    pub async fn access_token(&self, key: &str) -> Result<AccessToken, AuthError> {
        let now = epoch_seconds();
        let margin = self.config.refresh_margin_secs;
        match self.store.get(key).map_err(storage_error)? {
            Some(record) if !record.needs_refresh(now, margin) => {
                Ok(AccessToken::from_record(&record))
            }
            Some(_) => {
                let mut rx = self.join_refresh(key);
                loop {
                    let settled = rx.borrow_and_update().clone();
                    if let Some(outcome) = settled {
                        return outcome.map(|record| AccessToken::from_record(&record));
                    }
                    if rx.changed().await.is_err() {
                        return Err(AuthError::UpstreamUnavailable {
                            detail: "refresh task aborted".into(),
                        });
                    }
                }
            }
            None
                if self
                    .revoked
                    .lock()
                    .expect("revocation set poisoned")
                    .contains(key) =>
            {
                Err(AuthError::ReauthorizationRequired)
            }
            None => Err(AuthError::NotAuthorized),
        }
    }

    /// Join (or start) the single in-flight refresh for `key`.
    ///
    /// The refresh runs on its own task: a caller abandoning its future
    /// must not abort work other waiters share.
    fn join_refresh(&self, key: &str) -> watch::Receiver<RefreshOutcome> {
        let mut inflight = self.inflight.lock().expect("refresh gate poisoned");
        if let Some(rx) = inflight.get(key) {
            return rx.clone();
        }

        let (tx, rx) = watch::channel(None);
        inflight.insert(key.to_owned(), rx.clone());

        let key = key.to_owned();
        let store = Arc::clone(&self.store);
        let exchange = self.exchange.clone();
        let gate = Arc::clone(&self.inflight);
        let revoked = Arc::clone(&self.revoked);
        let margin = self.config.refresh_margin_secs;
        tokio::spawn(async move {
            let outcome = run_refresh(store, exchange, revoked, margin, &key).await;
            gate.lock().expect("refresh gate poisoned").remove(&key);
            let _ = tx.send(Some(outcome));
        });
        rx
    }

    /// Drop stored tokens for `key`. Explicit only; never part of login.
    pub fn invalidate(&self, key: &str) -> Result<(), AuthError> {
        self.store.invalidate(key).map_err(storage_error)?;
        self.revoked
            .lock()
            .expect("revocation set poisoned")
            .remove(key);
        Ok(())
    }

    pub fn phase(&self, key: &str) -> Result<AuthPhase, AuthError> {
        if self
            .inflight
            .lock()
            .expect("refresh gate poisoned")
            .contains_key(key)
        {
            return Ok(AuthPhase::Refreshing);
        }
        if self
            .revoked
            .lock()
            .expect("revocation set poisoned")
            .contains(key)
        {
            return Ok(AuthPhase::Revoked);
        }
        match self.store.get(key).map_err(storage_error)? {
            Some(_) => Ok(AuthPhase::Authorized),
            None => Ok(AuthPhase::Unauthorized),
        }
    }

    pub fn pending_attempts(&self) -> usize {
        self.attempts.pending()
    }
}

async fn run_refresh<T: TokenStore>(
    store: Arc<T>,
    exchange: TokenClient,
    revoked: Arc<Mutex<HashSet<String>>>,
    margin: u64,
    key: &str,
) -> Result<TokenRecord, AuthError> {
    let now = epoch_seconds();
    let current = store
        .get(key)
        .map_err(storage_error)?
        .ok_or(AuthError::NotAuthorized)?;
    // Another flight may have landed between the caller's check and this task.
    if !current.needs_refresh(now, margin) {
        return Ok(current);
    }
    let Some(refresh_token) = current.refresh_token.clone() else {
        return Err(AuthError::ReauthorizationRequired);
    };

    match exchange.refresh(&refresh_token).await {
        Ok(mut record) => {
            // Providers may omit the refresh token on a refresh grant.
            if record.refresh_token.is_none() {
                record.refresh_token = Some(refresh_token);
            }
            store.put(key, record.clone()).map_err(storage_error)?;
            tracing::info!(
                target: "oauth.refresh",
                key,
                expires_at = record.expires_at,
                "access token refreshed"
            );
            Ok(record)
        }
        Err(AuthError::RefreshTokenInvalid) => {
            tracing::warn!(
                target: "oauth.refresh",
                key,
                "refresh token revoked; key requires re-authorization"
            );
            store.invalidate(key).map_err(storage_error)?;
            revoked
                .lock()
                .expect("revocation set poisoned")
                .insert(key.to_owned());
            Err(AuthError::ReauthorizationRequired)
        }
        Err(err) => {
            // The stale record stays put so a later call can retry.
            tracing::warn!(target: "oauth.refresh", key, error = %err, "refresh failed");
            Err(err)
        }
    }
}

fn storage_error(err: anyhow::Error) -> AuthError {
    AuthError::Storage {
        detail: err.to_string(),
    }
}
