//! Domain layer
//!
//! Contains the core business logic and domain models.

pub mod events;
pub mod identity;
pub mod locking;
pub mod subscription;
