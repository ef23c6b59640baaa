//! redb table definitions for the record store.

use redb::TableDefinition;

/// Deployment records keyed by tag.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");
