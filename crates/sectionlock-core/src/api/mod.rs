//! API Module
//!
//! The surface a host application exposes to clients: one query, three
//! mutations and one subscription over the lock coordinator. Identifiers
//! arrive as strings and are parsed here; results leave as DTOs suitable
//! for serialization.

pub mod locks;

pub use locks::{LockApi, LockChangeSummary, LockSummary};

use crate::domain::locking::{ResourceId, Section};
use crate::{Error, Result};

/// Parse a resource id supplied by a client
pub fn parse_resource_id(id: &str) -> Result<ResourceId> {
    uuid::Uuid::parse_str(id.trim())
        .map_err(|_| Error::InvalidInput(format!("Invalid resource ID: {}", id)))
}

/// Parse a section name supplied by a client
pub fn parse_section(name: &str) -> Result<Section> {
    name.trim().parse::<Section>().map_err(Error::InvalidInput)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_id() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_resource_id(&id.to_string()).unwrap(), id);
        assert_eq!(parse_resource_id("R1").unwrap_err().code(), "E800");
    }

    #[test]
    fn test_parse_section() {
        assert_eq!(parse_section(" team ").unwrap(), Section::Team);
        assert!(matches!(
            parse_section("budget"),
            Err(Error::InvalidInput(_))
        ));
    }
}
