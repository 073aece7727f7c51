//! Lock-change subscriptions
//!
//! Each live connection subscribes to one resource. The subscription
//! receives every `LockChangeEvent` for that resource, and when the
//! connection's disconnect signal fires, every lock its account still
//! holds on the resource is released. No lock outlives the connection
//! that acquired it.

pub mod manager;
mod subscriber;

pub use manager::{
    CleanupReport, LockSubscription, SubscriptionConfig, SubscriptionManager,
    release_abandoned_locks,
};
