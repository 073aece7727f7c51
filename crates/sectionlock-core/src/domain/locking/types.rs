//! Lock types and error definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a resource whose sections are independently lockable
pub type ResourceId = Uuid;

/// Result type for lock operations
pub type LockResult<T> = std::result::Result<T, LockError>;

/// Lock errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Section is held by a different account
    #[error("Section '{section}' of resource {resource} is already locked by {holder}")]
    Conflict {
        resource: ResourceId,
        section: Section,
        holder: AccountId,
    },

    /// Release attempted by someone other than the holder
    #[error("{requester} is not authorized to release '{section}' (held by {holder})")]
    NotAuthorized {
        section: Section,
        holder: AccountId,
        requester: AccountId,
    },

    /// Principal has no resolvable account
    #[error("No account is associated with the current principal")]
    MissingIdentity,

    /// Privileged operation attempted without the privilege
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl LockError {
    /// Get error code for this lock error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "E300",
            Self::NotAuthorized { .. } => "E301",
            Self::MissingIdentity => "E302",
            Self::Forbidden(_) => "E303",
        }
    }
}

/// Stable account identifier of a principal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Independently lockable section of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Section {
    BusinessInformation,
    ImplementationDetails,
    Data,
    ToolsAndSoftware,
    SubSystems,
    Team,
    Contracts,
    FundingAndBudget,
    AtoAndSecurity,
}

impl Section {
    /// Every section, in display order
    pub const ALL: [Section; 9] = [
        Self::BusinessInformation,
        Self::ImplementationDetails,
        Self::Data,
        Self::ToolsAndSoftware,
        Self::SubSystems,
        Self::Team,
        Self::Contracts,
        Self::FundingAndBudget,
        Self::AtoAndSecurity,
    ];

    /// Wire name of the section
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessInformation => "BUSINESS_INFORMATION",
            Self::ImplementationDetails => "IMPLEMENTATION_DETAILS",
            Self::Data => "DATA",
            Self::ToolsAndSoftware => "TOOLS_AND_SOFTWARE",
            Self::SubSystems => "SUB_SYSTEMS",
            Self::Team => "TEAM",
            Self::Contracts => "CONTRACTS",
            Self::FundingAndBudget => "FUNDING_AND_BUDGET",
            Self::AtoAndSecurity => "ATO_AND_SECURITY",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strips separators and case so `BusinessInformation`, `business_information`
/// and `BUSINESS_INFORMATION` compare equal
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|section| normalize(section.as_str()) == wanted)
            .ok_or_else(|| format!("unknown section '{}'", s))
    }
}

/// The currently-held lock on one (resource, section) pair
///
/// Only ever handed out by value; the registry keeps its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub resource_id: ResourceId,
    pub section: Section,
    pub holder: AccountId,
    pub is_admin_holder: bool,
}

impl LockEntry {
    /// Create a lock entry
    pub fn new(
        resource_id: ResourceId,
        section: Section,
        holder: AccountId,
        is_admin_holder: bool,
    ) -> Self {
        Self {
            resource_id,
            section,
            holder,
            is_admin_holder,
        }
    }

    /// Check if the lock is held by the given account
    pub fn is_held_by(&self, account: &AccountId) -> bool {
        &self.holder == account
    }
}

/// Result of a successful acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A new lock was created
    Acquired,
    /// The caller already held the lock; nothing changed
    Refreshed,
}

/// Result of a release that was not rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The lock was removed
    Released,
    /// There was no lock to remove
    NotLocked,
}

impl ReleaseOutcome {
    /// Whether a lock was actually removed
    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released)
    }
}
