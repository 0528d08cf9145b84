//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod credential_gateway;
mod document_store;
mod subscription;

pub use credential_gateway::{CredentialGateway, IdentityListener};
pub use document_store::{
    DocumentData, DocumentStore, DocumentWrite, FieldWrite, Query, SnapshotStream, StoreEvent,
    StoredDocument,
};
pub use subscription::Subscription;
