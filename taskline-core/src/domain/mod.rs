//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod task;
mod user;
pub mod result;

pub use task::{sort_tasks, Task, TaskFilter, TaskPatch};
pub use user::{same_identity, UserIdentity};
