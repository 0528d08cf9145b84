//! Main database schema, embedded at build time
//!
//! `000` creates the migration ledger itself; new files are appended with
//! the next number and listed here in order.

use crate::services::Migration;

pub const MIGRATIONS: &[Migration] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
