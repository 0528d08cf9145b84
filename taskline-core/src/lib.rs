//! Taskline Core - sync and filter layer for personal task lists
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Task, UserIdentity, TaskFilter)
//! - **ports**: Trait definitions for external dependencies (DocumentStore, CredentialGateway)
//! - **services**: Task repository, session state, task view model, event log
//! - **adapters**: Concrete implementations (DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::{DuckDbCredentialGateway, DuckDbDatabase, DuckDbDocumentStore};
use config::Config;
use ports::{CredentialGateway, DocumentStore};
use services::{SessionState, TaskRepository, TaskViewModel};

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result as CoreResult};
pub use domain::{Task, TaskFilter, TaskPatch, UserIdentity};
pub use services::{FeedEvent, SessionSnapshot, TaskFeed, ViewUpdate};

/// File name of the local backend database inside the data directory
pub const DB_FILENAME: &str = "taskline.duckdb";

/// Main context for Taskline operations
///
/// Wires the local DuckDB backend to the services. One context per
/// process; sessions and view models are created from it.
pub struct TasklineContext {
    pub config: Config,
    pub database: Arc<DuckDbDatabase>,
    pub gateway: Arc<dyn CredentialGateway>,
    pub store: Arc<dyn DocumentStore>,
    pub repository: TaskRepository,
    data_dir: PathBuf,
}

impl TasklineContext {
    /// Open the data directory, creating it and the database as needed
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        let config = Config::load(data_dir)?;

        let db_path = data_dir.join(DB_FILENAME);
        let database = Arc::new(
            DuckDbDatabase::open(&db_path)
                .with_context(|| format!("Failed to open database at {}", db_path.display()))?,
        );
        database.ensure_schema()?;

        let gateway: Arc<dyn CredentialGateway> =
            Arc::new(DuckDbCredentialGateway::new(Arc::clone(&database)));
        let store: Arc<dyn DocumentStore> =
            Arc::new(DuckDbDocumentStore::new(Arc::clone(&database)));
        let repository = TaskRepository::with_collection(Arc::clone(&store), &config.collection);

        Ok(Self {
            config,
            database,
            gateway,
            store,
            repository,
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Start observing the signed-in identity
    pub fn session(&self) -> SessionState {
        SessionState::new(Arc::clone(&self.gateway))
    }

    /// A task list view using the configured default filter
    pub fn view_model(&self) -> TaskViewModel {
        TaskViewModel::with_filter(self.repository.clone(), self.config.default_filter)
    }
}
