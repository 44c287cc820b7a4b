//! Session credentials consumed by the event stream.
//!
//! The stream client only ever reads: once per connection attempt it asks
//! the [`CredentialStore`] for the current session token. Whoever handles
//! login owns writing it.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use secrecy::SecretString;
use tokio::sync::watch;

/// Source of the current session token and user id.
pub trait CredentialStore: Send + Sync {
    /// Current session token, or `None` when not authenticated.
    fn token(&self) -> BoxFuture<'_, Option<SecretString>>;

    /// Current user id, or `None` when not authenticated.
    fn user_id(&self) -> BoxFuture<'_, Option<String>>;
}

/// The authenticated session as last published.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: Option<SecretString>,
    pub user_id: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// In-memory, observable credential store.
///
/// Cloning shares the same underlying session, so a login flow can hold
/// one clone while the stream client reads another.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    tx: Arc<watch::Sender<Session>>,
}

impl SessionCredentials {
    /// An unauthenticated store.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Session::default());
        Self { tx: Arc::new(tx) }
    }

    /// A store that starts out authenticated.
    pub fn with_token(token: SecretString, user_id: Option<String>) -> Self {
        let store = Self::new();
        store.set_session(token, user_id);
        store
    }

    pub fn set_session(&self, token: SecretString, user_id: Option<String>) {
        self.tx.send_replace(Session {
            token: Some(token),
            user_id,
        });
    }

    pub fn clear(&self) {
        self.tx.send_replace(Session::default());
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Observe session changes (login, logout, token refresh).
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

impl Default for SessionCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for SessionCredentials {
    fn token(&self) -> BoxFuture<'_, Option<SecretString>> {
        ready(self.tx.borrow().token.clone()).boxed()
    }

    fn user_id(&self) -> BoxFuture<'_, Option<String>> {
        ready(self.tx.borrow().user_id.clone()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_owned())
    }

    #[tokio::test]
    async fn starts_unauthenticated() {
        let store = SessionCredentials::new();
        assert!(store.token().await.is_none());
        assert!(store.user_id().await.is_none());
        assert!(!store.current().is_authenticated());
    }

    #[tokio::test]
    async fn set_and_clear_session() {
        let store = SessionCredentials::new();
        store.set_session(secret("tok-1"), Some("u-42".into()));

        let token = store.token().await.unwrap();
        assert_eq!(token.expose_secret(), "tok-1");
        assert_eq!(store.user_id().await.as_deref(), Some("u-42"));

        store.clear();
        assert!(store.token().await.is_none());
    }

    #[tokio::test]
    async fn clones_share_the_session() {
        let login_side = SessionCredentials::new();
        let stream_side = login_side.clone();

        login_side.set_session(secret("tok-2"), None);
        assert_eq!(stream_side.token().await.unwrap().expose_secret(), "tok-2");
    }

    #[tokio::test]
    async fn session_changes_are_observable() {
        let store = SessionCredentials::new();
        let mut rx = store.subscribe();

        store.set_session(secret("tok-3"), Some("u-1".into()));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated());
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let store = SessionCredentials::with_token(secret("very-secret"), None);
        let rendered = format!("{:?}", store.current());
        assert!(!rendered.contains("very-secret"));
    }
}
