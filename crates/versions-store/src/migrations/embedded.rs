//! Store migrations, embedded at compile time

/// A named schema change
///
/// Callers with their own schema (owner and version tables) build these too
/// and hand them to `apply_migration_set`.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

pub fn store_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_attachments",
            sql: include_str!("../../migrations/001_attachments.sql"),
        },
        Migration {
            id: "002_version_lineages",
            sql: include_str!("../../migrations/002_version_lineages.sql"),
        },
    ]
}
