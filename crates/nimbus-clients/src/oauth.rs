use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::ClientError;

const REFRESH_SKEW: Duration = Duration::minutes(5);

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - REFRESH_SKEW
    }
}

/// Performs the refresh-token exchange against a provider. Implemented
/// per external service (meeting platform, ATS, ...).
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError>;
}

/// Persists the refreshed pair atomically so a crash between refresh and
/// persist never strands the client with a token it can't recover.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> TokenPair;
    async fn store(&self, pair: TokenPair) -> Result<(), ClientError>;
}

/// Returns a token guaranteed valid for at least `REFRESH_SKEW`, refreshing
/// and persisting first if the stored one is stale. Refresh failure is a
/// terminal `auth_failed` — the caller must prompt re-authorization.
pub async fn ensure_fresh_token(
    store: &dyn TokenStore,
    refresher: &dyn TokenRefresher,
    now: DateTime<Utc>,
) -> Result<TokenPair, ClientError> {
    let current = store.load().await;
    if !current.needs_refresh(now) {
        return Ok(current);
    }
    let refreshed = refresher.refresh(&current.refresh_token).await.map_err(|_| {
        ClientError::AuthFailed { reason: "re-authorization required".to_string() }
    })?;
    store.store(refreshed.clone()).await?;
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedStore(Mutex<TokenPair>);

    #[async_trait]
    impl TokenStore for FixedStore {
        async fn load(&self) -> TokenPair {
            self.0.lock().unwrap().clone()
        }
        async fn store(&self, pair: TokenPair) -> Result<(), ClientError> {
            *self.0.lock().unwrap() = pair;
            Ok(())
        }
    }

    struct SucceedingRefresher;

    #[async_trait]
    impl TokenRefresher for SucceedingRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
            Ok(TokenPair {
                access_token: "new-access".into(),
                refresh_token: refresh_token.to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            })
        }
    }

    struct FailingRefresher;

    #[async_trait]
    impl TokenRefresher for FailingRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, ClientError> {
            Err(ClientError::Network { reason: "timeout".into() })
        }
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_refreshing() {
        let pair = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        let store = FixedStore(Mutex::new(pair));
        let result = ensure_fresh_token(&store, &SucceedingRefresher, Utc::now()).await.unwrap();
        assert_eq!(result.access_token, "a");
    }

    #[tokio::test]
    async fn stale_token_triggers_refresh_and_persists_atomically() {
        let pair = TokenPair {
            access_token: "old".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() + Duration::minutes(1),
        };
        let store = FixedStore(Mutex::new(pair));
        let result = ensure_fresh_token(&store, &SucceedingRefresher, Utc::now()).await.unwrap();
        assert_eq!(result.access_token, "new-access");
        assert_eq!(store.load().await.access_token, "new-access");
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_terminal_auth_error() {
        let pair = TokenPair {
            access_token: "old".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        let store = FixedStore(Mutex::new(pair));
        let err = ensure_fresh_token(&store, &FailingRefresher, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ClientError::AuthFailed { .. }));
    }
}
