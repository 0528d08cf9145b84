//! Credential handling shared by the local gateway adapters
//!
//! Passwords are stored as Argon2id PHC strings. Reset tokens are handed
//! out once and only their SHA-256 digest is kept.
//!
//! [`LocalCredentialGateway`] owns the account flow (validation, hashing,
//! session changes, listener notification). The in-memory and DuckDB
//! adapters only provide an [`AccountStore`].

use std::sync::OnceLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::live::ListenerRegistry;
use crate::domain::result::{Error, Result};
use crate::domain::UserIdentity;
use crate::ports::{CredentialGateway, IdentityListener, Subscription};

/// Argon2id parameters (OWASP minimum recommendation)
const MEMORY_COST_KIB: u32 = 19456;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

/// Minimum password length accepted on register
pub const MIN_PASSWORD_LEN: usize = 6;

const RESET_TOKEN_BYTES: usize = 32;

fn hasher() -> Result<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| Error::Config(format!("invalid argon2 params: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password into a PHC string
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Database(format!("failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string
fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    match hasher() {
        Ok(argon2) => argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    match EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok()) {
        Some(re) => re.is_match(email),
        None => email.contains('@'),
    }
}

/// Normalize an email for lookup: trimmed, lowercase
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate registration input, returning the normalized email
fn validate_registration(email: &str, password: &str) -> Result<String> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(Error::validation(format!("invalid email address: {}", email)));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(email)
}

/// A recorded password reset. The token itself is delivered out of band
/// (email); only its digest is stored.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetRequest {
    pub email: String,
    pub token_hash: String,
    pub requested_at: DateTime<Utc>,
}

/// Generate a reset token, returning `(token, sha256 hex digest)`
fn new_reset_token() -> (String, String) {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    let digest = hex::encode(Sha256::digest(token.as_bytes()));
    (token, digest)
}

/// An account as the local stores keep it
#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub identity: UserIdentity,
    pub password_hash: String,
}

/// Storage behind a [`LocalCredentialGateway`]. Emails are already
/// normalized when they reach the store.
pub trait AccountStore: Send + Sync {
    fn find_account(&self, email: &str) -> Result<Option<StoredAccount>>;

    /// Insert a new account, failing with `EmailAlreadyInUse` when the
    /// email is taken. The check and the insert happen atomically.
    fn insert_account(&self, account: StoredAccount) -> Result<()>;

    fn load_session(&self) -> Result<Option<UserIdentity>>;

    fn save_session(&self, identity: Option<&UserIdentity>) -> Result<()>;

    fn record_reset(&self, request: PasswordResetRequest) -> Result<()>;
}

/// Credential gateway over any [`AccountStore`]
pub struct LocalCredentialGateway<S> {
    accounts: S,
    listeners: ListenerRegistry,
}

impl<S: AccountStore> LocalCredentialGateway<S> {
    pub fn with_store(accounts: S) -> Self {
        Self {
            accounts,
            listeners: ListenerRegistry::new(),
        }
    }

    pub(crate) fn accounts(&self) -> &S {
        &self.accounts
    }

    /// Number of live identity listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Persist the session, then notify listeners
    pub(crate) fn set_session(&self, identity: Option<UserIdentity>) -> Result<()> {
        self.accounts.save_session(identity.as_ref())?;
        self.listeners.notify(identity);
        Ok(())
    }
}

#[async_trait]
impl<S: AccountStore> CredentialGateway for LocalCredentialGateway<S> {
    async fn register(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let email = validate_registration(email, password)?;
        // Skip the hashing cost for emails that are obviously taken
        if self.accounts.find_account(&email)?.is_some() {
            return Err(Error::EmailAlreadyInUse(email));
        }

        let identity = UserIdentity::new(Uuid::new_v4().simple().to_string(), email);
        self.accounts.insert_account(StoredAccount {
            identity: identity.clone(),
            password_hash: hash_password(password)?,
        })?;

        tracing::info!(user = %identity.id, "account registered");
        self.set_session(Some(identity.clone()))?;
        Ok(identity)
    }

    async fn login(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let account = self
            .accounts
            .find_account(&normalize_email(email))?
            .ok_or(Error::InvalidCredentials)?;
        if !verify_password(password, &account.password_hash) {
            return Err(Error::InvalidCredentials);
        }

        self.set_session(Some(account.identity.clone()))?;
        Ok(account.identity)
    }

    async fn logout(&self) -> Result<()> {
        if self.accounts.load_session()?.is_none() {
            return Ok(());
        }
        self.set_session(None)
    }

    async fn reset_password(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        if self.accounts.find_account(&email)?.is_none() {
            return Err(Error::UserNotFound(email));
        }

        let (_token, token_hash) = new_reset_token();
        self.accounts.record_reset(PasswordResetRequest {
            email,
            token_hash,
            requested_at: Utc::now(),
        })?;
        tracing::info!("password reset requested");
        Ok(())
    }

    fn current_identity(&self) -> Option<UserIdentity> {
        match self.accounts.load_session() {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read session");
                None
            }
        }
    }

    fn on_identity_changed(&self, listener: IdentityListener) -> Subscription {
        self.listeners.add(listener, self.current_identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-phc-string"));
    }

    #[test]
    fn test_validate_registration() {
        assert_eq!(
            validate_registration("  Alice@Example.com ", "secret1").unwrap(),
            "alice@example.com"
        );
        assert!(matches!(
            validate_registration("not-an-email", "secret1"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            validate_registration("bob@example.com", "123"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_reset_token_digest() {
        let (token, digest) = new_reset_token();
        assert!(!token.is_empty());
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hex::encode(Sha256::digest(token.as_bytes())));

        let (other, _) = new_reset_token();
        assert_ne!(token, other);
    }
}
