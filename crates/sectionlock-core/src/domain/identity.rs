//! Acting principal supplied by the identity provider

use serde::{Deserialize, Serialize};

use crate::domain::locking::{AccountId, LockError, LockResult};

/// The authenticated identity performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Account of the caller, absent for unresolved or expired sessions
    pub account: Option<AccountId>,
    /// Elevated privilege for this domain
    pub is_admin: bool,
}

impl Principal {
    /// A regular editor
    pub fn user(account: impl Into<AccountId>) -> Self {
        Self {
            account: Some(account.into()),
            is_admin: false,
        }
    }

    /// An editor with administrative privilege
    pub fn admin(account: impl Into<AccountId>) -> Self {
        Self {
            account: Some(account.into()),
            is_admin: true,
        }
    }

    /// A principal without a resolvable account
    pub fn anonymous() -> Self {
        Self {
            account: None,
            is_admin: false,
        }
    }

    /// The caller's account, failing closed when there is none
    pub fn account_id(&self) -> LockResult<&AccountId> {
        self.account.as_ref().ok_or(LockError::MissingIdentity)
    }
}
