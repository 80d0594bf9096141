//! # File Storage Module
//!
//! Per-user permissioned object storage: metadata and grants in SQLite,
//! bytes in an object store, kept consistent by the coordinator.

pub mod errors;
pub mod object;
pub mod permissions;
pub mod metadata;
pub mod backend;
pub mod coordinator;
pub mod reconcile;

pub use errors::{StorageError, StorageResult};
pub use object::{ObjectSummary, StoredObject};
pub use permissions::{Capability, PermissionGrant};
pub use metadata::{MetadataStore, SqliteMetadataStore};
pub use backend::{BlobBackendKind, BlobStore, BlobStoreConfig, ObjectStoreBackend};
pub use coordinator::{Download, StorageCoordinator};
pub use reconcile::{ReconcileOptions, ReconcileReport, Reconciler};
