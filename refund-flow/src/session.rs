use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    client::ApiClient,
    error::{FlowError, Result},
    models::AuthUser,
    storage::{KeyValueStore, KeyValueStoreExt},
};

pub const TOKEN_KEY: &str = "auth.token";
pub const USER_KEY: &str = "auth.user";

/// A signed-in user and the token the backend issued for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: AuthUser,
}

/// Which of the two stores holds the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    Persistent,
    SessionOnly,
}

impl SessionScope {
    pub fn from_remember(remember: bool) -> Self {
        if remember {
            Self::Persistent
        } else {
            Self::SessionOnly
        }
    }
}

/// Keeps the auth token and user in one of two stores, persistent store first on reads.
#[derive(Clone)]
pub struct SessionStore {
    persistent: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(persistent: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self {
            persistent,
            session,
        }
    }

    fn store(&self, scope: SessionScope) -> &dyn KeyValueStore {
        match scope {
            SessionScope::Persistent => self.persistent.as_ref(),
            SessionScope::SessionOnly => self.session.as_ref(),
        }
    }

    pub async fn save(&self, session: &Session, scope: SessionScope) -> Result<()> {
        let store = self.store(scope);
        store.set(TOKEN_KEY, session.token.clone()).await?;
        store.set_json(USER_KEY, &session.user).await
    }

    /// Removes the token and user from both stores.
    pub async fn clear(&self) -> Result<()> {
        for store in [self.persistent.as_ref(), self.session.as_ref()] {
            store.remove(TOKEN_KEY).await?;
            store.remove(USER_KEY).await?;
        }
        Ok(())
    }

    pub async fn token(&self) -> Result<Option<String>> {
        for store in [self.persistent.as_ref(), self.session.as_ref()] {
            if let Some(token) = store.get(TOKEN_KEY).await?.filter(|t| !t.is_empty()) {
                return Ok(Some(token));
            }
        }
        Ok(None)
    }

    /// The stored user; an unreadable record counts as signed out.
    pub async fn current_user(&self) -> Result<Option<AuthUser>> {
        for store in [self.persistent.as_ref(), self.session.as_ref()] {
            if let Some(raw) = store.get(USER_KEY).await?.filter(|u| !u.is_empty()) {
                return Ok(serde_json::from_str(&raw)
                    .inspect_err(|e| warn!(error = %e, "Stored user record is unreadable"))
                    .ok());
            }
        }
        Ok(None)
    }

    pub async fn current(&self) -> Result<Option<Session>> {
        let (Some(token), Some(user)) = (self.token().await?, self.current_user().await?) else {
            return Ok(None);
        };
        Ok(Some(Session { token, user }))
    }
}

/// Verifies credentials with the backend and stores the resulting session.
///
/// Blank credentials are rejected before any request is sent.
pub async fn sign_in(
    client: &ApiClient,
    sessions: &SessionStore,
    email: &str,
    password: &str,
    remember: bool,
) -> Result<Session> {
    let email = email.trim();
    let password = password.trim();
    if email.is_empty() || password.is_empty() {
        return Err(FlowError::validation("Email and password are required"));
    }

    let response = client.login(email, password).await?;
    let token = response
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| FlowError::InvalidResponse("Invalid server response".to_string()))?;
    let user = response.user.unwrap_or_else(|| AuthUser {
        email: email.to_string(),
    });

    let session = Session { token, user };
    let scope = SessionScope::from_remember(remember);
    sessions.save(&session, scope).await?;

    info!(email = %session.user.email, scope = ?scope, "Signed in");
    Ok(session)
}

pub async fn sign_out(sessions: &SessionStore) -> Result<()> {
    sessions.clear().await?;
    info!("Signed out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn stores() -> (InMemoryStore, InMemoryStore, SessionStore) {
        let persistent = InMemoryStore::new();
        let session = InMemoryStore::new();
        let sessions = SessionStore::new(Arc::new(persistent.clone()), Arc::new(session.clone()));
        (persistent, session, sessions)
    }

    fn sample() -> Session {
        Session {
            token: "tok-123".to_string(),
            user: AuthUser {
                email: "ana@example.com".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn remember_selects_the_store() {
        let (persistent, session, sessions) = stores();

        sessions
            .save(&sample(), SessionScope::from_remember(false))
            .await
            .unwrap();
        assert!(persistent.get(TOKEN_KEY).await.unwrap().is_none());
        assert_eq!(
            session.get(TOKEN_KEY).await.unwrap().as_deref(),
            Some("tok-123")
        );
        assert_eq!(
            session.get(USER_KEY).await.unwrap().as_deref(),
            Some(r#"{"email":"ana@example.com"}"#)
        );
        assert_eq!(sessions.current().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn persistent_store_wins_on_read() {
        let (_, session, sessions) = stores();
        session.set(TOKEN_KEY, "older".to_string()).await.unwrap();
        sessions
            .save(&sample(), SessionScope::Persistent)
            .await
            .unwrap();

        assert_eq!(sessions.token().await.unwrap().as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn clear_empties_both_scopes() {
        let (persistent, session, sessions) = stores();
        sessions.save(&sample(), SessionScope::Persistent).await.unwrap();
        sessions.save(&sample(), SessionScope::SessionOnly).await.unwrap();

        sign_out(&sessions).await.unwrap();
        for store in [&persistent, &session] {
            assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
            assert!(store.get(USER_KEY).await.unwrap().is_none());
        }
        assert!(sessions.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_user_counts_as_signed_out() {
        let (persistent, _, sessions) = stores();
        persistent.set(TOKEN_KEY, "tok".to_string()).await.unwrap();
        persistent.set(USER_KEY, "not json".to_string()).await.unwrap();

        assert!(sessions.current_user().await.unwrap().is_none());
        assert!(sessions.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_credentials_fail_before_any_request() {
        let (_, _, sessions) = stores();
        // Nothing listens on the discard port; reaching the network would surface an Http error.
        let client = ApiClient::new("http://127.0.0.1:9");

        let err = sign_in(&client, &sessions, "  ", "secret", true)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Email and password are required");

        let err = sign_in(&client, &sessions, "ana@example.com", "", false)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
