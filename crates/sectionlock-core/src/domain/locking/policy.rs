//! Authorization rules for releasing locks
//!
//! Pure functions of the caller and the entry. The normal path only lets
//! a holder release its own lock; the administrative path bypasses
//! ownership and marks the resulting events as [`ActionType::Admin`].

use super::event::ActionType;
use super::types::{AccountId, LockEntry, LockError, LockResult};
use crate::domain::identity::Principal;

/// Whether `requester` may release `entry` through the normal path
pub fn may_release(requester: &AccountId, entry: &LockEntry) -> bool {
    entry.is_held_by(requester)
}

/// Whether `principal` may bulk-release every lock on a resource
pub fn may_release_all(principal: &Principal) -> bool {
    principal.account.is_some() && principal.is_admin
}

/// Self-ownership check for a normal release
pub fn authorize_release(requester: &AccountId, entry: &LockEntry) -> LockResult<ActionType> {
    if may_release(requester, entry) {
        Ok(ActionType::Normal)
    } else {
        Err(LockError::NotAuthorized {
            section: entry.section,
            holder: entry.holder.clone(),
            requester: requester.clone(),
        })
    }
}

/// Administrative override check for a bulk release
pub fn authorize_release_all(principal: &Principal) -> LockResult<ActionType> {
    principal.account_id()?;
    if may_release_all(principal) {
        Ok(ActionType::Admin)
    } else {
        Err(LockError::Forbidden(
            "releasing every lock on a resource requires admin privilege".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::locking::types::Section;
    use uuid::Uuid;

    fn entry(holder: &str) -> LockEntry {
        LockEntry::new(Uuid::new_v4(), Section::Team, holder.into(), false)
    }

    #[test]
    fn test_holder_may_release() {
        let entry = entry("ABCD");
        assert_eq!(
            authorize_release(&"ABCD".into(), &entry),
            Ok(ActionType::Normal)
        );
    }

    #[test]
    fn test_non_holder_may_not_release() {
        let entry = entry("ABCD");
        let err = authorize_release(&"USR1".into(), &entry).unwrap_err();
        assert_eq!(err.code(), "E301");
    }

    #[test]
    fn test_admin_flag_does_not_bypass_normal_release() {
        let entry = entry("ABCD");
        assert!(!may_release(&"ADMN".into(), &entry));
    }

    #[test]
    fn test_release_all_requires_admin() {
        assert_eq!(
            authorize_release_all(&Principal::admin("ADMN")),
            Ok(ActionType::Admin)
        );
        assert!(matches!(
            authorize_release_all(&Principal::user("USR1")),
            Err(LockError::Forbidden(_))
        ));
        assert_eq!(
            authorize_release_all(&Principal::anonymous()),
            Err(LockError::MissingIdentity)
        );
    }
}
