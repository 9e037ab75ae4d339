//! Single-flight cache for bearer tokens.

use crate::GatewayResult;
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::sync::Mutex;

/// An access token and the instant it stops being valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expiry: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(value: impl Into<String>, expiry: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expiry,
        }
    }

    /// A token is usable while it is non-empty and `expiry` is strictly after `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.value.is_empty() && self.expiry > now
    }
}

/// Caches one access token and serialises refreshes.
///
/// The lock is held across the refresh future, so concurrent callers arriving while a token is
/// being fetched wait for it and then read the fresh value rather than starting their own
/// exchange.
#[derive(Debug, Default)]
pub struct TokenCache {
    current: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, running `refresh` first if there is no usable one.
    ///
    /// # Errors
    ///
    /// Returns whatever `refresh` returns. The cache is left empty, so the next caller will
    /// refresh again.
    pub async fn get_token<F, Fut>(&self, refresh: F) -> GatewayResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<CachedToken>>,
    {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if token.is_usable(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        *current = None;
        let token = refresh().await?;
        tracing::debug!(expiry = %token.expiry, "access token refreshed");
        let value = token.value.clone();
        *current = Some(token);
        Ok(value)
    }

    /// Whether the next [`TokenCache::get_token`] call will refresh.
    pub async fn expired(&self) -> bool {
        match self.current.lock().await.as_ref() {
            Some(token) => !token.is_usable(Utc::now()),
            None => true,
        }
    }

    /// Forget the cached token.
    pub async fn clear(&self) {
        *self.current.lock().await = None;
    }
}
