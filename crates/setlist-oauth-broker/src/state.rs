use std::{
    collections::{BTreeSet, HashMap},
    sync::RwLock,
    time::{Duration, SystemTime},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

const STATE_ENTROPY_BYTES: usize = 32;

/// Generate an opaque, URL-safe anti-forgery state value.
pub fn generate_state() -> String {
    let mut entropy = [0u8; STATE_ENTROPY_BYTES];
    rand::rng().fill_bytes(&mut entropy);
    URL_SAFE_NO_PAD.encode(entropy)
}

/// One in-flight authorization awaiting its provider callback.
#[derive(Debug, Clone)]
pub struct AuthorizationAttempt {
    pub state: String,
    pub created_at: SystemTime,
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    pub force_consent: bool,
}

impl AuthorizationAttempt {
    fn is_expired(&self, ttl: Duration) -> bool {
        match self.created_at.elapsed() {
            Ok(age) => age > ttl,
            Err(_) => false,
        }
    }
}

/// Pending-attempt store.
///
/// Attempts are consumed exactly once via [`AttemptStore::claim`]; expiry
/// is checked lazily on both insert and claim, and the store never grows
/// past its capacity (oldest attempts are evicted first).
pub struct AttemptStore {
    ttl: Duration,
    capacity: usize,
    inner: RwLock<HashMap<String, AuthorizationAttempt>>,
}

impl AttemptStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, attempt: AuthorizationAttempt) {
        let mut guard = self.inner.write().expect("attempt store poisoned");
        let ttl = self.ttl;
        guard.retain(|_, pending| !pending.is_expired(ttl));
        while guard.len() >= self.capacity {
            let oldest = guard
                .values()
                .min_by_key(|pending| pending.created_at)
                .map(|pending| pending.state.clone());
            match oldest {
                Some(state) => {
                    guard.remove(&state);
                }
                None => break,
            }
        }
        guard.insert(attempt.state.clone(), attempt);
    }

    /// Atomic lookup-and-delete; a state value is claimable at most once.
    pub fn claim(&self, state: &str) -> Option<AuthorizationAttempt> {
        let mut guard = self.inner.write().expect("attempt store poisoned");
        let attempt = guard.remove(state)?;
        if attempt.is_expired(self.ttl) {
            return None;
        }
        Some(attempt)
    }

    pub fn pending(&self) -> usize {
        self.inner.read().expect("attempt store poisoned").len()
    }
}
