//! Storage layer for Attest.
//!
//! The [`DocumentStore`] trait is the tenant-scoped CRUD + transaction
//! capability every higher layer consumes; [`SqliteStore`] is its bundled
//! implementation. The typed repositories translate between domain records
//! and stored documents and carry the optimistic-concurrency contract: every
//! state-changing write supplies the version last read, and a stale version
//! is a [`StoreError::VersionConflict`], never a silent merge.

pub mod audit;
pub mod repository;
pub mod sqlite;
pub mod store;

pub use audit::{AuditEvent, AuditEventType, AuditLog, StorageAuditLog};
pub use repository::{EvidenceRepository, SessionRepository, UploadRepository};
pub use sqlite::SqliteStore;
pub use store::{Collection, DocumentStore, StoreError, TxOps, VersionedDoc};
