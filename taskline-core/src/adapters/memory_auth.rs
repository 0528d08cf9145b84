//! In-memory credential gateway

use std::collections::HashMap;
use std::sync::Mutex;

use super::credentials::{
    AccountStore, LocalCredentialGateway, PasswordResetRequest, StoredAccount,
};
use crate::domain::result::{Error, Result};
use crate::domain::UserIdentity;

#[derive(Default)]
struct AuthState {
    accounts: HashMap<String, StoredAccount>,
    current: Option<UserIdentity>,
    resets: Vec<PasswordResetRequest>,
}

/// Accounts, session and reset requests held in process memory
#[derive(Default)]
pub struct MemoryAccounts {
    state: Mutex<AuthState>,
}

impl MemoryAccounts {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, AuthState>> {
        self.state
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

impl AccountStore for MemoryAccounts {
    fn find_account(&self, email: &str) -> Result<Option<StoredAccount>> {
        Ok(self.lock()?.accounts.get(email).cloned())
    }

    fn insert_account(&self, account: StoredAccount) -> Result<()> {
        let mut state = self.lock()?;
        let email = account.identity.email.clone();
        if state.accounts.contains_key(&email) {
            return Err(Error::EmailAlreadyInUse(email));
        }
        state.accounts.insert(email, account);
        Ok(())
    }

    fn load_session(&self) -> Result<Option<UserIdentity>> {
        Ok(self.lock()?.current.clone())
    }

    fn save_session(&self, identity: Option<&UserIdentity>) -> Result<()> {
        self.lock()?.current = identity.cloned();
        Ok(())
    }

    fn record_reset(&self, request: PasswordResetRequest) -> Result<()> {
        self.lock()?.resets.push(request);
        Ok(())
    }
}

/// Credential gateway keeping accounts and the session in memory
pub type InMemoryCredentialGateway = LocalCredentialGateway<MemoryAccounts>;

impl InMemoryCredentialGateway {
    pub fn new() -> Self {
        Self::with_store(MemoryAccounts::default())
    }

    /// Simulate the provider ending the session (token expiry, revocation)
    pub fn expire_session(&self) -> Result<()> {
        self.set_session(None)
    }

    /// Password resets requested so far
    pub fn reset_requests(&self) -> Vec<PasswordResetRequest> {
        self.accounts()
            .lock()
            .map(|s| s.resets.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryCredentialGateway {
    fn default() -> Self {
        Self::new()
    }
}
