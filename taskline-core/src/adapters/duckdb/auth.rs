//! Credential gateway over the sys_users / sys_auth_session tables
//!
//! The signed-in session survives restarts: it lives in a single-row
//! table, so each CLI invocation sees the identity the previous one left.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use duckdb::{params, Connection};

use super::DuckDbDatabase;
use crate::adapters::credentials::{
    AccountStore, LocalCredentialGateway, PasswordResetRequest, StoredAccount,
};
use crate::domain::result::{Error, Result};
use crate::domain::UserIdentity;

const SESSION_SLOT: i32 = 1;

/// Account tables of the local database
pub struct DuckDbAccounts {
    db: Arc<DuckDbDatabase>,
}

fn find_account(conn: &Connection, email: &str) -> Result<Option<StoredAccount>> {
    let mut stmt =
        conn.prepare("SELECT user_id, email, password_hash FROM sys_users WHERE email = ?")?;
    let mut rows = stmt.query([email])?;
    match rows.next()? {
        Some(row) => Ok(Some(StoredAccount {
            identity: UserIdentity::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
            password_hash: row.get(2)?,
        })),
        None => Ok(None),
    }
}

impl AccountStore for DuckDbAccounts {
    fn find_account(&self, email: &str) -> Result<Option<StoredAccount>> {
        find_account(&*self.db.conn()?, email)
    }

    fn insert_account(&self, account: StoredAccount) -> Result<()> {
        let conn = self.db.conn()?;
        if find_account(&conn, &account.identity.email)?.is_some() {
            return Err(Error::EmailAlreadyInUse(account.identity.email));
        }
        conn.execute(
            "INSERT INTO sys_users (user_id, email, password_hash, created_at)
             VALUES (?, ?, ?, ?)",
            params![
                account.identity.id,
                account.identity.email,
                account.password_hash,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn load_session(&self) -> Result<Option<UserIdentity>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT u.user_id, u.email
             FROM sys_auth_session s JOIN sys_users u ON u.user_id = s.user_id
             WHERE s.slot = ?",
        )?;
        let mut rows = stmt.query([SESSION_SLOT])?;
        match rows.next()? {
            Some(row) => Ok(Some(UserIdentity::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))),
            None => Ok(None),
        }
    }

    fn save_session(&self, identity: Option<&UserIdentity>) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute("DELETE FROM sys_auth_session WHERE slot = ?", [SESSION_SLOT])?;
        if let Some(identity) = identity {
            conn.execute(
                "INSERT INTO sys_auth_session (slot, user_id, signed_in_at) VALUES (?, ?, ?)",
                params![SESSION_SLOT, identity.id, Utc::now().to_rfc3339()],
            )?;
        }
        Ok(())
    }

    fn record_reset(&self, request: PasswordResetRequest) -> Result<()> {
        self.db.conn()?.execute(
            "INSERT INTO sys_password_resets (email, token_hash, requested_at) VALUES (?, ?, ?)",
            params![
                request.email,
                request.token_hash,
                request.requested_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

/// Local credential gateway persisted in DuckDB
pub type DuckDbCredentialGateway = LocalCredentialGateway<DuckDbAccounts>;

impl DuckDbCredentialGateway {
    pub fn new(db: Arc<DuckDbDatabase>) -> Self {
        Self::with_store(DuckDbAccounts { db })
    }

    /// Password resets requested so far, oldest first
    pub fn reset_requests(&self) -> Result<Vec<PasswordResetRequest>> {
        let conn = self.accounts().db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT email, token_hash, requested_at FROM sys_password_resets ORDER BY requested_at",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut requests = Vec::new();
        for row in rows {
            let (email, token_hash, requested_at) = row?;
            let requested_at = DateTime::parse_from_rfc3339(&requested_at)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            requests.push(PasswordResetRequest {
                email,
                token_hash,
                requested_at,
            });
        }
        Ok(requests)
    }
}
