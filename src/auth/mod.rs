//! Session store.
//!
//! Owns the current identity and bearer token, persists them in durable local
//! storage and publishes every transition to subscribers.
//!
//! ```text
//! Unknown ──restore──▶ Authenticated | Anonymous
//! Anonymous ──login──▶ Authenticated
//! Authenticated ──logout / 401──▶ Anonymous
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::api::ApiClient;
use crate::db::LocalStorage;
use crate::errors::{ClientError, ClientResult};

/// Storage key holding the JSON-encoded session.
pub const SESSION_STORAGE_KEY: &str = "bjdms_session";

/// An authenticated user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    pub role: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Why there is no session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedOutReason {
    /// Nothing was persisted, or the persisted value was unusable
    NeverSignedIn,
    /// The user logged out
    LoggedOut,
    /// The server rejected the token
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Before `restore` has run
    Unknown,
    Authenticated(Session),
    Anonymous(SignedOutReason),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Holds the current session and mirrors it into durable storage.
pub struct SessionStore {
    storage: Arc<dyn LocalStorage>,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self { storage, state }
    }

    /// Load the persisted session. Makes no network call; a stale token is
    /// discovered on its first use.
    pub async fn restore(&self) -> SessionState {
        let stored = match self.storage.get_item(SESSION_STORAGE_KEY).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Could not read persisted session: {}", e);
                None
            }
        };

        let next = match stored.map(|raw| serde_json::from_str::<Session>(&raw)) {
            Some(Ok(session)) if !session.token.is_empty() => {
                tracing::info!(user_id = %session.user_id, "Restored persisted session");
                SessionState::Authenticated(session)
            }
            Some(_) => {
                tracing::warn!("Discarding malformed persisted session");
                if let Err(e) = self.storage.remove_item(SESSION_STORAGE_KEY).await {
                    tracing::warn!("Could not remove malformed session: {}", e);
                }
                SessionState::Anonymous(SignedOutReason::NeverSignedIn)
            }
            None => SessionState::Anonymous(SignedOutReason::NeverSignedIn),
        };

        self.state.send_replace(next.clone());
        next
    }

    /// Authenticate against the API and persist the resulting session.
    pub async fn login(
        &self,
        api: &ApiClient,
        identifier: &str,
        secret: &str,
    ) -> ClientResult<Session> {
        let response = api.authenticate(identifier, secret).await?;

        let session = Session {
            user_id: response.user.id,
            display_name: response.user.full_name,
            role: response.user.role.unwrap_or_else(|| "member".to_string()),
            token: response.access_token,
            refresh_token: response.refresh_token,
        };

        let encoded = serde_json::to_string(&session)
            .map_err(|e| ClientError::Storage(format!("Cannot encode session: {}", e)))?;
        self.storage.set_item(SESSION_STORAGE_KEY, &encoded).await?;

        tracing::info!(user_id = %session.user_id, "Logged in");
        self.state
            .send_replace(SessionState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Forget the session locally. Safe to call repeatedly.
    ///
    /// The persisted copy is deleted first. If that fails the session stays
    /// signed in, so a restart cannot resurrect a session that looked closed.
    pub async fn logout(&self) -> ClientResult<()> {
        if let Err(e) = self.storage.remove_item(SESSION_STORAGE_KEY).await {
            tracing::error!("Could not clear persisted session, staying signed in: {}", e);
            return Err(e);
        }
        self.state
            .send_replace(SessionState::Anonymous(SignedOutReason::LoggedOut));
        Ok(())
    }

    /// Handle a token rejection. Only the session that owned `rejected_token`
    /// is dropped, so a late 401 cannot end a newer session.
    pub async fn expire(&self, rejected_token: Option<&str>) -> bool {
        let expired = self.state.send_if_modified(|state| {
            let owned_token = state
                .session()
                .is_some_and(|s| Some(s.token.as_str()) == rejected_token);
            if owned_token {
                *state = SessionState::Anonymous(SignedOutReason::Expired);
            }
            owned_token
        });

        if expired {
            tracing::warn!("Session token rejected by server, signing out");
            if let Err(e) = self.storage.remove_item(SESSION_STORAGE_KEY).await {
                tracing::error!("Could not clear expired session: {}", e);
            }
        }
        expired
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().session().map(|s| s.token.clone())
    }

    /// Observe session transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The single authorization gate: the current session, or the reason there is none.
    pub fn require_session(&self) -> ClientResult<Session> {
        match &*self.state.borrow() {
            SessionState::Authenticated(session) => Ok(session.clone()),
            SessionState::Anonymous(SignedOutReason::Expired) => Err(ClientError::SessionExpired),
            _ => Err(ClientError::Unauthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStorage, SqliteStorage};
    use tempfile::TempDir;

    fn sample_session() -> Session {
        Session {
            user_id: "u-1".to_string(),
            display_name: "Demo User".to_string(),
            role: "admin".to_string(),
            token: "token-abc".to_string(),
            refresh_token: Some("refresh-xyz".to_string()),
        }
    }

    async fn persist(storage: &dyn LocalStorage, session: &Session) {
        storage
            .set_item(SESSION_STORAGE_KEY, &serde_json::to_string(session).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(
            SqliteStorage::open(&temp_dir.path().join("client.sqlite"))
                .await
                .unwrap(),
        );
        persist(storage.as_ref(), &sample_session()).await;

        let store = SessionStore::new(storage);
        assert_eq!(store.state(), SessionState::Unknown);

        let state = store.restore().await;
        assert_eq!(state, SessionState::Authenticated(sample_session()));
        assert_eq!(store.current(), Some(sample_session()));
    }

    #[tokio::test]
    async fn test_restore_without_persisted_session_is_anonymous() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        assert_eq!(
            store.restore().await,
            SessionState::Anonymous(SignedOutReason::NeverSignedIn)
        );
        assert!(matches!(
            store.require_session(),
            Err(ClientError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_restore_discards_malformed_session() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item(SESSION_STORAGE_KEY, "{not json")
            .await
            .unwrap();

        let store = SessionStore::new(storage.clone());
        assert_eq!(
            store.restore().await,
            SessionState::Anonymous(SignedOutReason::NeverSignedIn)
        );
        assert_eq!(storage.get_item(SESSION_STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let storage = Arc::new(MemoryStorage::new());
        persist(storage.as_ref(), &sample_session()).await;
        let store = SessionStore::new(storage.clone());
        store.restore().await;

        for _ in 0..2 {
            store.logout().await.unwrap();
            assert_eq!(store.current(), None);
            assert_eq!(storage.get_item(SESSION_STORAGE_KEY).await.unwrap(), None);
            assert_eq!(
                store.state(),
                SessionState::Anonymous(SignedOutReason::LoggedOut)
            );
        }
    }

    /// Storage whose deletes fail until `healthy` is set.
    struct FlakyStorage {
        inner: MemoryStorage,
        healthy: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl LocalStorage for FlakyStorage {
        async fn get_item(&self, key: &str) -> ClientResult<Option<String>> {
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: &str) -> ClientResult<()> {
            self.inner.set_item(key, value).await
        }

        async fn remove_item(&self, key: &str) -> ClientResult<()> {
            if !self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(ClientError::Storage("disk I/O error".to_string()));
            }
            self.inner.remove_item(key).await
        }
    }

    #[tokio::test]
    async fn test_logout_keeps_session_when_storage_delete_fails() {
        let storage = Arc::new(FlakyStorage {
            inner: MemoryStorage::new(),
            healthy: std::sync::atomic::AtomicBool::new(false),
        });
        persist(storage.as_ref(), &sample_session()).await;
        let store = SessionStore::new(storage.clone());
        store.restore().await;

        let err = store.logout().await.unwrap_err();
        assert!(matches!(err, ClientError::Storage(_)));
        assert_eq!(store.state(), SessionState::Authenticated(sample_session()));
        assert!(storage
            .get_item(SESSION_STORAGE_KEY)
            .await
            .unwrap()
            .is_some());

        // A restart would restore exactly what the UI still shows.
        let restarted = SessionStore::new(storage.clone());
        assert_eq!(
            restarted.restore().await,
            SessionState::Authenticated(sample_session())
        );

        storage
            .healthy
            .store(true, std::sync::atomic::Ordering::SeqCst);
        store.logout().await.unwrap();
        assert_eq!(
            store.state(),
            SessionState::Anonymous(SignedOutReason::LoggedOut)
        );
        assert_eq!(storage.get_item(SESSION_STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expire_only_drops_matching_token() {
        let storage = Arc::new(MemoryStorage::new());
        persist(storage.as_ref(), &sample_session()).await;
        let store = SessionStore::new(storage.clone());
        store.restore().await;

        assert!(!store.expire(Some("some-older-token")).await);
        assert!(store.state().is_authenticated());

        assert!(store.expire(Some("token-abc")).await);
        assert_eq!(
            store.state(),
            SessionState::Anonymous(SignedOutReason::Expired)
        );
        assert!(matches!(
            store.require_session(),
            Err(ClientError::SessionExpired)
        ));
        assert_eq!(storage.get_item(SESSION_STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let storage = Arc::new(MemoryStorage::new());
        persist(storage.as_ref(), &sample_session()).await;
        let store = SessionStore::new(storage);
        let mut rx = store.subscribe();

        store.restore().await;
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated());

        store.logout().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(
            *rx.borrow_and_update(),
            SessionState::Anonymous(SignedOutReason::LoggedOut)
        );
    }
}
