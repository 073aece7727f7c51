//! Collaborative section locking
//!
//! Lets exactly one editor at a time hold an exclusive editing lock on a
//! named section of a shared resource, and publishes every lock state
//! change so live connections can follow along.
//!
//! # Architecture
//!
//! - **Registry**: `LockRegistry`, the in-memory table behind one mutex
//! - **Coordinator**: `LockCoordinator`, acquire/release/release-all/list
//! - **Policy**: who may release what (holder, or admin bulk release)
//! - **Events**: `LockChangeEvent`, one per visible transition
//!
//! Locks do not expire. A lock lives until its holder releases it, an
//! administrator bulk-releases the resource, or the holder's connection
//! drops (see `domain::subscription`).
//!
//! # Example
//!
//! ```ignore
//! use sectionlock_core::domain::locking::{LockCoordinator, Section};
//!
//! let coordinator = LockCoordinator::new(publisher);
//! coordinator.acquire(resource_id, Section::Team, &principal).await?;
//! coordinator.release(resource_id, Section::Team, principal.account_id()?).await?;
//! ```

pub mod coordinator;
pub mod event;
pub mod policy;
pub mod registry;
pub mod types;

// Re-export main types
pub use coordinator::LockCoordinator;
pub use event::{ActionType, ChangeType, LOCK_CHANGED_EVENT, LockChangeEvent};
pub use registry::LockRegistry;
pub use types::{
    AccountId, AcquireOutcome, LockEntry, LockError, LockResult, ReleaseOutcome, ResourceId,
    Section,
};
