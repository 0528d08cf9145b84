//! User identity domain model

use serde::{Deserialize, Serialize};

/// The authenticated user as reported by the credential gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// Compare two optional identities by id only.
///
/// Downstream subscriptions depend on who is signed in, not on profile
/// fields, so an email change alone is not an identity change.
pub fn same_identity(a: Option<&UserIdentity>, b: Option<&UserIdentity>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.id == b.id,
        _ => false,
    }
}
