//! The document-store capability.
//!
//! Every operation is scoped by tenant id; there is no call shape through
//! which one tenant's documents can address another's. The store maintains a
//! version counter per document: `update` is an atomic compare-and-swap on
//! it, which is what the repositories build the optimistic-concurrency
//! contract from.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use attest_types::TenantId;

/// The closed set of document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Sessions,
    Modules,
    Evidence,
    Uploads,
    AuditLog,
}

impl Collection {
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::Modules => "modules",
            Self::Evidence => "evidence",
            Self::Uploads => "uploads",
            Self::AuditLog => "audit-log",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// A stored document together with its store-maintained version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDoc {
    pub doc: Value,
    pub version: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {collection}/{id} already exists")]
    AlreadyExists { collection: Collection, id: String },

    #[error("document {collection}/{id} not found")]
    NotFound { collection: Collection, id: String },

    /// The stored version advanced past the one the caller read. The caller
    /// must re-fetch; the write was not applied.
    #[error("version conflict: wrote against version {expected}, stored version is {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    /// A write that the domain forbids regardless of versions, e.g.
    /// reopening a terminal upload record.
    #[error("illegal update: {0}")]
    IllegalUpdate(String),

    #[error("document serialization failed")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Operations available inside a transaction.
///
/// The same contract as the top-level store, minus nested transactions.
pub trait TxOps {
    fn create(&self, collection: Collection, id: &str, doc: &Value) -> Result<u64, StoreError>;

    fn find_by_id(&self, collection: Collection, id: &str)
        -> Result<Option<VersionedDoc>, StoreError>;

    fn update(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;
}

/// Tenant-scoped CRUD + transaction capability.
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. Fails with [`StoreError::AlreadyExists`] on a
    /// duplicate id. The document starts at version 1, which is returned.
    fn create(
        &self,
        tenant: &TenantId,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<u64, StoreError>;

    fn find_by_id(
        &self,
        tenant: &TenantId,
        collection: Collection,
        id: &str,
    ) -> Result<Option<VersionedDoc>, StoreError>;

    /// All documents in the collection for this tenant, unordered.
    fn find_all(
        &self,
        tenant: &TenantId,
        collection: Collection,
    ) -> Result<Vec<VersionedDoc>, StoreError>;

    /// Atomic compare-and-swap: applied only if the stored version equals
    /// `expected_version`, in which case the version increments by exactly
    /// one and the new version is returned.
    fn update(
        &self,
        tenant: &TenantId,
        collection: Collection,
        id: &str,
        doc: &Value,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// Returns whether a document was removed.
    fn delete(&self, tenant: &TenantId, collection: Collection, id: &str)
        -> Result<bool, StoreError>;

    /// Execute a set of operations atomically: either every write in `f`
    /// commits or none does.
    fn in_transaction(
        &self,
        tenant: &TenantId,
        f: &mut dyn FnMut(&dyn TxOps) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}
