//! Authorization-code flow coordination and token lifecycle management.
//!
//! The serving layer drives three operations: [`LifecycleManager::begin_authorization`]
//! to obtain a consent redirect, [`LifecycleManager::complete_authorization`] to
//! validate the provider callback and commit tokens, and
//! [`LifecycleManager::access_token`] to read a bearer token, transparently
//! refreshed behind a per-key single-flight gate.

pub mod config;
pub mod exchange;
pub mod manager;
pub mod state;
pub mod store;

pub use config::{BrokerConfig, ConfigError};
pub use exchange::{RetryPolicy, TokenClient};
pub use manager::{
    AuthPhase, AuthorizeRequest, BeginAuthorization, CallbackParams, LifecycleManager,
};
pub use state::{AttemptStore, AuthorizationAttempt, generate_state};
pub use store::{InMemoryTokenStore, TokenStore};
