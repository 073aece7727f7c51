//! Sectionlock Core Library
//!
//! This crate provides the core functionality for Sectionlock, including:
//! - Exclusive per-section editing locks on shared resources
//! - Ownership and administrator override rules
//! - Lock-change events pushed to live subscribers
//! - Automatic release of a connection's locks when it disconnects
//! - Configuration with file persistence

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{LockApi, LockChangeSummary, LockSummary};
    pub use crate::config::Config;
    pub use crate::domain::identity::Principal;
    pub use crate::domain::locking::{AccountId, ResourceId, Section};
    pub use crate::error::{Error, Result};
}
