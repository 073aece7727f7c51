//! Locking domain events
//!
//! One `LockChangeEvent` is published per visible state transition of a
//! (resource, section) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::LockEntry;

/// Event-type tag lock changes are published under
pub const LOCK_CHANGED_EVENT: &str = "section_lock_changed";

/// Whether a lock appeared or disappeared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Added,
    Removed,
}

impl ChangeType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "lock_added",
            Self::Removed => "lock_removed",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who caused the change: the holder, or an administrator overriding it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Normal,
    Admin,
}

/// A lock state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockChangeEvent {
    /// Unique event identifier
    pub id: Uuid,
    /// Added or removed
    pub change_type: ChangeType,
    /// Copy of the entry that was added or removed
    pub entry: LockEntry,
    /// Normal or administrative
    pub action_type: ActionType,
    /// Registry revision assigned while the mutation held the registry lock
    pub revision: u64,
    /// When the event occurred
    pub created_at: DateTime<Utc>,
}

impl LockChangeEvent {
    /// Create a new lock change event
    pub fn new(
        change_type: ChangeType,
        entry: LockEntry,
        action_type: ActionType,
        revision: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            change_type,
            entry,
            action_type,
            revision,
            created_at: Utc::now(),
        }
    }

    /// Create a lock added event
    pub fn added(entry: LockEntry, revision: u64) -> Self {
        Self::new(ChangeType::Added, entry, ActionType::Normal, revision)
    }

    /// Create a lock removed event
    pub fn removed(entry: LockEntry, action_type: ActionType, revision: u64) -> Self {
        Self::new(ChangeType::Removed, entry, action_type, revision)
    }
}
