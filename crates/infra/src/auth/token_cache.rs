//! Bearer token cache with single-flight refresh
//!
//! One cache is shared by every pipeline that talks to the same backend.
//! Readers take the current token without blocking each other; refreshes are
//! serialized so that a burst of 401s mints exactly one new token.

use erpsync_core::CredentialProvider;
use erpsync_domain::{ErpSyncError, Result};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Current bearer token plus the refresh gate.
#[derive(Debug, Default)]
pub struct TokenCache {
    current: RwLock<Option<String>>,
    refresh_gate: Mutex<()>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache seeded with a previously obtained token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self { current: RwLock::new(Some(token.into())), refresh_gate: Mutex::new(()) }
    }

    pub async fn current(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    pub async fn set(&self, token: impl Into<String>) {
        *self.current.write().await = Some(token.into());
    }

    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    /// Replace `rejected` with a fresh token from `provider`.
    ///
    /// If another caller already replaced `rejected` while this one waited
    /// for the gate, the newer token is returned without calling the
    /// provider again.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, or `ErpSyncError::Internal` when
    /// `cancel` fires while waiting.
    pub async fn refresh(
        &self,
        rejected: Option<&str>,
        provider: &dyn CredentialProvider,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let _gate = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            gate = self.refresh_gate.lock() => gate,
        };

        if let Some(current) = self.current.read().await.as_deref() {
            if Some(current) != rejected {
                debug!("token already refreshed by a concurrent caller");
                return Ok(current.to_string());
            }
        }

        let token = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            token = provider.access_token(cancel) => token?,
        };

        if token.is_empty() {
            return Err(ErpSyncError::Auth("credential provider returned an empty token".into()));
        }

        *self.current.write().await = Some(token.clone());
        info!("bearer token refreshed");
        Ok(token)
    }
}

fn cancelled() -> ErpSyncError {
    ErpSyncError::Internal("token refresh cancelled".into())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    struct CountingProvider {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingProvider {
        fn new(delay: Duration) -> Self {
            Self { calls: AtomicUsize::new(0), delay }
        }
    }

    #[async_trait]
    impl CredentialProvider for CountingProvider {
        async fn access_token(&self, _cancel: &CancellationToken) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(format!("token-{n}"))
        }
    }

    #[tokio::test]
    async fn refresh_replaces_rejected_token() {
        let cache = TokenCache::with_token("stale");
        let provider = CountingProvider::new(Duration::ZERO);

        let token = cache.refresh(Some("stale"), &provider, &CancellationToken::new()).await;

        assert_eq!(token.unwrap(), "token-1");
        assert_eq!(cache.current().await.as_deref(), Some("token-1"));
    }

    #[tokio::test]
    async fn concurrent_refreshes_of_same_token_call_provider_once() {
        let cache = Arc::new(TokenCache::with_token("stale"));
        let provider = Arc::new(CountingProvider::new(Duration::from_millis(20)));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let provider = provider.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                cache.refresh(Some("stale"), provider.as_ref(), &cancel).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_cache_is_filled_on_first_refresh() {
        let cache = TokenCache::new();
        let provider = CountingProvider::new(Duration::ZERO);

        assert!(cache.current().await.is_none());
        let token = cache.refresh(None, &provider, &CancellationToken::new()).await.unwrap();
        assert_eq!(token, "token-1");
    }

    #[tokio::test]
    async fn cancelled_refresh_does_not_call_provider() {
        let cache = TokenCache::with_token("stale");
        let provider = CountingProvider::new(Duration::ZERO);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(cache.refresh(Some("stale"), &provider, &cancel).await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.current().await.as_deref(), Some("stale"));
    }
}
