//! Core primitives for the Setlist OAuth authorization-code coordinator.
//!
//! Everything in this crate is pure: token shapes, the classified error
//! surface, and consent-URL construction. Network and state live in
//! `setlist-oauth-broker`.

pub mod authorize;
pub mod error;
pub mod types;

pub use authorize::{ProviderEndpoints, build_authorize_url};
pub use error::{AuthError, AuthResult};
pub use types::{AccessToken, TokenRecord, TokenResponse};
