//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the DocumentStore and CredentialGateway ports (local backend)
//! - In-memory DocumentStore and CredentialGateway for tests and embedding
//!
//! Both credential gateways share `LocalCredentialGateway` and differ only
//! in their `AccountStore`.

mod credentials;
pub mod duckdb;
mod live;
mod memory_auth;
mod memory_store;
mod writes;

pub use credentials::{
    AccountStore, LocalCredentialGateway, PasswordResetRequest, StoredAccount, MIN_PASSWORD_LEN,
};
pub use live::FanoutStats;
pub use memory_auth::{InMemoryCredentialGateway, MemoryAccounts};
pub use memory_store::{InMemoryDocumentStore, StoreCallCounts};
