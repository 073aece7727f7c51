//! Infrastructure layer
//!
//! In-process implementations of the collaborators the domain depends on.

pub mod pubsub;

pub use pubsub::InMemoryPubSub;
