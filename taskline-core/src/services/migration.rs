//! Schema migrations for the embedded DuckDB databases
//!
//! A migration set is an ordered list of `(name, sql)` pairs compiled into
//! the binary. The first entry of every set creates `sys_migrations`, where
//! each name is recorded once its SQL has run.

use std::collections::HashSet;

use anyhow::{Context, Result};
use duckdb::Connection;

use crate::migrations::MIGRATIONS;

/// An embedded migration: `(file name, sql)`
pub type Migration = (&'static str, &'static str);

/// Outcome of [`MigrationService::run_pending`]
#[derive(Debug, Default)]
pub struct MigrationResult {
    /// Names applied by this run, in order
    pub applied: Vec<String>,
    /// Migrations that were already recorded
    pub already_applied: usize,
}

/// Applies one migration set to one connection
pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [Migration],
}

impl<'a> MigrationService<'a> {
    /// Main database schema (documents, accounts, session)
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_migrations(conn, MIGRATIONS)
    }

    /// Any other set, e.g. the event log's
    pub fn with_migrations(conn: &'a Connection, migrations: &'static [Migration]) -> Self {
        Self { conn, migrations }
    }

    /// Apply every migration not yet recorded, in set order
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let recorded = self.recorded()?;
        let mut result = MigrationResult::default();

        for (name, sql) in self.migrations {
            if recorded.contains(*name) {
                result.already_applied += 1;
                continue;
            }
            tracing::debug!(migration = *name, "applying migration");
            self.conn
                .execute_batch(sql)
                .with_context(|| format!("Migration {} failed", name))?;
            self.conn.execute(
                "INSERT INTO sys_migrations (migration_name) VALUES (?)",
                [*name],
            )?;
            result.applied.push(name.to_string());
        }

        if !result.applied.is_empty() {
            tracing::info!(count = result.applied.len(), "schema migrated");
        }
        Ok(result)
    }

    /// Recorded migration names; empty before the bootstrap migration ran
    fn recorded(&self) -> Result<HashSet<String>> {
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
            [],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Ok(HashSet::new());
        }

        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }
}
