//! Credential gateway port - hosted identity service abstraction

use async_trait::async_trait;

use super::Subscription;
use crate::domain::result::Result;
use crate::domain::UserIdentity;

/// Callback invoked with the signed-in identity (or `None`) on every
/// authentication state change
pub type IdentityListener = Box<dyn Fn(Option<UserIdentity>) + Send + Sync>;

/// Email/password identity service
///
/// Implementations keep the signed-in session themselves and notify
/// listeners after every sign-in and sign-out.
#[async_trait]
pub trait CredentialGateway: Send + Sync {
    /// Create an account and sign it in
    async fn register(&self, email: &str, password: &str) -> Result<UserIdentity>;

    /// Sign in with existing credentials
    async fn login(&self, email: &str, password: &str) -> Result<UserIdentity>;

    /// Sign out the current session (no-op when nobody is signed in)
    async fn logout(&self) -> Result<()>;

    /// Start a password reset for the given email
    async fn reset_password(&self, email: &str) -> Result<()>;

    /// The identity signed in right now
    fn current_identity(&self) -> Option<UserIdentity>;

    /// Register a listener. It is called once right away with the current
    /// identity, then on every change until the handle is cancelled.
    fn on_identity_changed(&self, listener: IdentityListener) -> Subscription;
}
