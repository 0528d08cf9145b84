//! Session state - who is signed in right now
//!
//! Mirrors the credential gateway's authentication state into a
//! `tokio::sync::watch` channel that the rest of the application observes.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::result::{Error, Result};
use crate::domain::UserIdentity;
use crate::ports::{CredentialGateway, Subscription};

/// Observable authentication state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub identity: Option<UserIdentity>,
    /// True until the gateway has reported for the first time
    pub loading: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }
}

/// Holds the single identity listener registered with the gateway
pub struct SessionState {
    gateway: Arc<dyn CredentialGateway>,
    state: Arc<watch::Sender<SessionSnapshot>>,
    listener: Subscription,
    last_error: Option<Error>,
}

impl SessionState {
    pub fn new(gateway: Arc<dyn CredentialGateway>) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        let state = Arc::new(tx);

        let sink = Arc::clone(&state);
        let listener = gateway.on_identity_changed(Box::new(move |identity| {
            let changed = sink.send_if_modified(|current| {
                let modified = current.loading || current.identity != identity;
                current.loading = false;
                current.identity = identity.clone();
                modified
            });
            if changed {
                tracing::debug!(
                    user = identity.as_ref().map(|i| i.id.as_str()).unwrap_or("-"),
                    "session changed"
                );
            }
        }));

        Self {
            gateway,
            state,
            listener,
            last_error: None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        self.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Receiver that sees every later change of the session
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Wait until the gateway has reported at least once
    pub async fn wait_until_loaded(&self) -> SessionSnapshot {
        let mut rx = self.watch();
        let snapshot = match rx.wait_for(|s| !s.loading).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    /// Error of the most recent failed auth call, cleared when the next
    /// call starts
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    fn record<T>(&mut self, action: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::debug!(action, error = %e, "auth call failed");
            self.last_error = Some(e.clone());
        }
        result
    }

    pub async fn register(&mut self, email: &str, password: &str) -> Result<UserIdentity> {
        self.last_error = None;
        let result = self.gateway.register(email, password).await;
        self.record("register", result)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserIdentity> {
        self.last_error = None;
        let result = self.gateway.login(email, password).await;
        self.record("login", result)
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.last_error = None;
        let result = self.gateway.logout().await;
        self.record("logout", result)
    }

    pub async fn reset_password(&mut self, email: &str) -> Result<()> {
        self.last_error = None;
        let result = self.gateway.reset_password(email).await;
        self.record("reset_password", result)
    }

    /// Unregister the gateway listener. Dropping the session does the same.
    pub fn close(self) {
        self.listener.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryCredentialGateway;

    fn setup() -> (Arc<InMemoryCredentialGateway>, SessionState) {
        let gateway = Arc::new(InMemoryCredentialGateway::new());
        let session = SessionState::new(gateway.clone());
        (gateway, session)
    }

    #[test]
    fn test_default_snapshot_is_loading() {
        let snapshot = SessionSnapshot::default();
        assert!(snapshot.loading);
        assert!(snapshot.identity.is_none());
    }

    #[tokio::test]
    async fn test_first_report_ends_loading() {
        let (gateway, session) = setup();
        assert_eq!(gateway.listener_count(), 1);

        let snapshot = session.wait_until_loaded().await;
        assert!(!snapshot.loading);
        assert!(snapshot.identity.is_none());
    }

    #[tokio::test]
    async fn test_tracks_register_and_logout() {
        let (_gateway, mut session) = setup();
        let mut rx = session.watch();

        let user = session.register("alice@example.com", "secret1").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().identity, Some(user.clone()));
        assert_eq!(session.identity(), Some(user));

        session.logout().await.unwrap();
        assert!(session.identity().is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_repeated_report_is_idempotent() {
        let (gateway, session) = setup();
        let mut rx = session.watch();
        rx.borrow_and_update();

        gateway.expire_session().unwrap();
        assert!(!rx.has_changed().unwrap());
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_last_error_recorded_and_cleared() {
        let (_gateway, mut session) = setup();

        let err = session.login("nobody@example.com", "secret1").await.unwrap_err();
        assert_eq!(err, Error::InvalidCredentials);
        assert_eq!(session.last_error(), Some(&Error::InvalidCredentials));

        session.register("alice@example.com", "secret1").await.unwrap();
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_close_and_drop_unregister_listener() {
        let (gateway, session) = setup();
        session.close();
        assert_eq!(gateway.listener_count(), 0);

        let session = SessionState::new(gateway.clone());
        assert_eq!(gateway.listener_count(), 1);
        drop(session);
        assert_eq!(gateway.listener_count(), 0);
    }
}
