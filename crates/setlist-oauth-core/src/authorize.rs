use std::collections::BTreeSet;

use url::Url;

use crate::error::AuthError;

const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Authorization and token endpoints of one OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize: Url,
    pub token: Url,
}

impl ProviderEndpoints {
    pub fn new(authorize: &str, token: &str) -> Result<Self, AuthError> {
        let authorize = Url::parse(authorize)
            .map_err(|err| AuthError::InvalidConfig(format!("invalid authorize url: {err}")))?;
        let token = Url::parse(token)
            .map_err(|err| AuthError::InvalidConfig(format!("invalid token url: {err}")))?;
        Ok(Self { authorize, token })
    }

    /// Spotify's account-service endpoints.
    pub fn spotify() -> Self {
        Self::new(SPOTIFY_AUTHORIZE_URL, SPOTIFY_TOKEN_URL)
            .expect("static spotify endpoints are valid URLs")
    }
}

/// Build the provider consent-screen URL.
///
/// Pure: no side effects, no network. Scopes are space-joined in the set's
/// lexicographic order so the output is deterministic. `force_consent`
/// appends `show_dialog=true`, the provider's always-prompt switch.
pub fn build_authorize_url(
    authorize_endpoint: &Url,
    client_id: &str,
    redirect_uri: &str,
    scopes: &BTreeSet<String>,
    state: &str,
    force_consent: bool,
) -> Result<Url, AuthError> {
    if client_id.is_empty() {
        return Err(AuthError::InvalidConfig("client_id must not be empty".into()));
    }
    if redirect_uri.is_empty() {
        return Err(AuthError::InvalidConfig(
            "redirect_uri must not be empty".into(),
        ));
    }

    let mut url = authorize_endpoint.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("client_id", client_id);
        pairs.append_pair("response_type", "code");
        pairs.append_pair("redirect_uri", redirect_uri);
        if !scopes.is_empty() {
            let joined = scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
            pairs.append_pair("scope", &joined);
        }
        pairs.append_pair("state", state);
        if force_consent {
            pairs.append_pair("show_dialog", "true");
        }
    }
    Ok(url)
}
