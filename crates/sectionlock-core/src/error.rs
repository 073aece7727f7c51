//! Error types for Sectionlock

use thiserror::Error;

use crate::domain::locking::LockError;

/// Result type alias using Sectionlock's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Sectionlock error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Lock errors (E300-E399)
    #[error(transparent)]
    Lock(#[from] LockError),

    // Subscription errors (E400-E499)
    #[error("Subscriber {0} is no longer receiving events")]
    SubscriberClosed(String),

    #[error("Delivery to subscriber {0} timed out after {1} ms")]
    DeliveryTimeout(String, u64),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Lock(e) => e.code(),
            Self::SubscriberClosed(_) => "E400",
            Self::DeliveryTimeout(..) => "E401",
            Self::InvalidInput(_) => "E800",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Lock(LockError::Conflict { holder, .. }) => {
                Some(format!("Wait for {} to finish editing", holder))
            }
            Self::Lock(LockError::MissingIdentity) => Some("Sign in again".to_string()),
            Self::InvalidInput(_) => Some("sectionlock shell, then `sections`".to_string()),
            _ => None,
        }
    }

    /// Whether this error is a lock conflict with another editor
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Lock(LockError::Conflict { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::locking::{AccountId, Section};
    use uuid::Uuid;

    #[test]
    fn test_lock_error_code_passthrough() {
        let error: Error = LockError::Conflict {
            resource: Uuid::nil(),
            section: Section::Team,
            holder: AccountId::from("ABCD"),
        }
        .into();

        assert_eq!(error.code(), "E300");
        assert!(error.is_conflict());
        assert_eq!(
            error.suggestion(),
            Some("Wait for ABCD to finish editing".to_string())
        );
    }

    #[test]
    fn test_invalid_input_error() {
        let error = Error::InvalidInput("bad section".to_string());
        assert_eq!(error.code(), "E800");
        assert!(!error.is_conflict());
        assert!(error.to_string().contains("bad section"));
    }

    #[test]
    fn test_subscription_error_codes() {
        let closed = Error::SubscriberClosed("sub-1".to_string());
        assert_eq!(closed.code(), "E400");
        assert_eq!(closed.suggestion(), None);

        let timeout = Error::DeliveryTimeout("sub-1".to_string(), 250);
        assert_eq!(timeout.code(), "E401");
        assert!(timeout.to_string().contains("250 ms"));
    }
}
