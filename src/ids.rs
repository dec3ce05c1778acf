//! Identifier generation
//!
//! IDs are random v4 UUIDs with a role prefix; no state is shared between calls.

use uuid::Uuid;

/// Generate an ID for a server instance
pub fn generate_server_id() -> String {
    format!("server-{}", Uuid::new_v4())
}

/// Generate an ID for a newly authenticated client
pub fn generate_client_id() -> String {
    format!("client-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert!(generate_server_id().starts_with("server-"));
        assert!(generate_client_id().starts_with("client-"));
    }

    #[test]
    fn test_client_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..100).map(|_| generate_client_id()).collect();
        assert_eq!(ids.len(), 100);
    }
}
