//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod logging;
pub mod migration;
mod session;
mod task_repository;
mod task_view_model;

pub use logging::{EntryPoint, LogEntry, LogEvent, LogStats, LoggingService};
pub use migration::{Migration, MigrationResult, MigrationService};
pub use session::{SessionSnapshot, SessionState};
pub use task_repository::{
    coerce_timestamp, normalize_document, FeedEvent, TaskFeed, TaskRepository,
    DEFAULT_COLLECTION,
};
pub use task_view_model::{TaskViewModel, ViewUpdate};
