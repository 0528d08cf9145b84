//! Event log schema for logs.duckdb
//!
//! Tracked in the log database's own `sys_migrations`, independent of the
//! main database.

use crate::services::Migration;

pub const LOG_MIGRATIONS: &[Migration] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
