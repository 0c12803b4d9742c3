use std::{collections::HashMap, sync::Mutex};

use anyhow::Result;
use setlist_oauth_core::TokenRecord;

/// Persistence boundary for issued tokens.
///
/// Implementations must serialize concurrent writes per key so a reader
/// observes either a fully-old or fully-new record. Callers never assume
/// in-memory semantics; a durable backend stores the [`TokenRecord`]
/// fields keyed by the caller's identifier.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<TokenRecord>>;
    fn put(&self, key: &str, record: TokenRecord) -> Result<()>;
    fn invalidate(&self, key: &str) -> Result<()>;
}

/// Process-lifetime store; whole records swap atomically under one lock.
#[derive(Default)]
pub struct InMemoryTokenStore {
    inner: Mutex<HashMap<String, TokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<TokenRecord>> {
        let inner = self.inner.lock().expect("token store poisoned");
        Ok(inner.get(key).cloned())
    }

    fn put(&self, key: &str, record: TokenRecord) -> Result<()> {
        let mut inner = self.inner.lock().expect("token store poisoned");
        inner.insert(key.to_owned(), record);
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("token store poisoned");
        inner.remove(key);
        Ok(())
    }
}
