//! SQLite-backed [`DocumentStore`].
//!
//! One `documents` table keyed by (tenant, collection, id) with a version
//! column; the CAS update is a single `UPDATE ... WHERE version = ?`, so the
//! check and the write are one atomic statement. The connection sits behind
//! a mutex; concurrent-access safety is this capability's responsibility,
//! not its callers'.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;

use attest_types::TenantId;

use crate::store::{Collection, DocumentStore, StoreError, TxOps, VersionedDoc};

pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS documents (
            tenant_id TEXT NOT NULL,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            doc TEXT NOT NULL,
            version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (tenant_id, collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_scope
        ON documents(tenant_id, collection);
    ";

    /// Open or create the store database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("failed to create {}: {e}", parent.display())))?;
        }
        let db = Connection::open(path)?;
        Self::initialize(db)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;")?;
        db.execute_batch(Self::SCHEMA)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.db
            .lock()
            .map_err(|_| StoreError::Backend("storage mutex poisoned".to_owned()))
    }
}

// Shared row operations, usable both directly and inside a transaction.

fn create_doc(
    conn: &Connection,
    tenant: &TenantId,
    collection: Collection,
    id: &str,
    doc: &Value,
) -> Result<u64, StoreError> {
    let now = Utc::now().to_rfc3339();
    let result = conn.execute(
        "INSERT INTO documents (tenant_id, collection, id, doc, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        params![tenant.as_str(), collection.as_key(), id, doc.to_string(), now],
    );
    match result {
        Ok(_) => Ok(1),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(StoreError::AlreadyExists {
                collection,
                id: id.to_owned(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn find_doc(
    conn: &Connection,
    tenant: &TenantId,
    collection: Collection,
    id: &str,
) -> Result<Option<VersionedDoc>, StoreError> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT doc, version FROM documents
             WHERE tenant_id = ?1 AND collection = ?2 AND id = ?3",
            params![tenant.as_str(), collection.as_key(), id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    row.map(|(raw, version)| {
        let doc = serde_json::from_str(&raw)?;
        Ok(VersionedDoc {
            doc,
            version: version as u64,
        })
    })
    .transpose()
}

fn update_doc(
    conn: &Connection,
    tenant: &TenantId,
    collection: Collection,
    id: &str,
    doc: &Value,
    expected_version: u64,
) -> Result<u64, StoreError> {
    let now = Utc::now().to_rfc3339();
    let changed = conn.execute(
        "UPDATE documents SET doc = ?4, version = version + 1, updated_at = ?5
         WHERE tenant_id = ?1 AND collection = ?2 AND id = ?3 AND version = ?6",
        params![
            tenant.as_str(),
            collection.as_key(),
            id,
            doc.to_string(),
            now,
            expected_version as i64
        ],
    )?;
    if changed == 1 {
        return Ok(expected_version + 1);
    }

    // Zero rows: either the document is gone or the version advanced.
    match find_doc(conn, tenant, collection, id)? {
        None => Err(StoreError::NotFound {
            collection,
            id: id.to_owned(),
        }),
        Some(current) => Err(StoreError::VersionConflict {
            expected: expected_version,
            actual: current.version,
        }),
    }
}

fn delete_doc(
    conn: &Connection,
    tenant: &TenantId,
    collection: Collection,
    id: &str,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "DELETE FROM documents WHERE tenant_id = ?1 AND collection = ?2 AND id = ?3",
        params![tenant.as_str(), collection.as_key(), id],
    )?;
    Ok(changed == 1)
}

struct TxView<'a> {
    conn: &'a Connection,
    tenant: &'a TenantId,
}

impl TxOps for TxView<'_> {
    fn create(&self, collection: Collection, id: &str, doc: &Value) -> Result<u64, StoreError> {
        create_doc(self.conn, self.tenant, collection, id, doc)
    }

    fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<VersionedDoc>, StoreError> {
        find_doc(self.conn, self.tenant, collection, id)
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        update_doc(self.conn, self.tenant, collection, id, doc, expected_version)
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        delete_doc(self.conn, self.tenant, collection, id)
    }
}

impl DocumentStore for SqliteStore {
    fn create(
        &self,
        tenant: &TenantId,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<u64, StoreError> {
        create_doc(&*self.lock()?, tenant, collection, id, doc)
    }

    fn find_by_id(
        &self,
        tenant: &TenantId,
        collection: Collection,
        id: &str,
    ) -> Result<Option<VersionedDoc>, StoreError> {
        find_doc(&*self.lock()?, tenant, collection, id)
    }

    fn find_all(
        &self,
        tenant: &TenantId,
        collection: Collection,
    ) -> Result<Vec<VersionedDoc>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT doc, version FROM documents
             WHERE tenant_id = ?1 AND collection = ?2",
        )?;
        let rows = stmt.query_map(params![tenant.as_str(), collection.as_key()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (raw, version) = row?;
            docs.push(VersionedDoc {
                doc: serde_json::from_str(&raw)?,
                version: version as u64,
            });
        }
        Ok(docs)
    }

    fn update(
        &self,
        tenant: &TenantId,
        collection: Collection,
        id: &str,
        doc: &Value,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        update_doc(&*self.lock()?, tenant, collection, id, doc, expected_version)
    }

    fn delete(
        &self,
        tenant: &TenantId,
        collection: Collection,
        id: &str,
    ) -> Result<bool, StoreError> {
        delete_doc(&*self.lock()?, tenant, collection, id)
    }

    fn in_transaction(
        &self,
        tenant: &TenantId,
        f: &mut dyn FnMut(&dyn TxOps) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let view = TxView {
            conn: &tx,
            tenant,
        };
        // A failing closure drops the transaction, which rolls back.
        f(&view)?;
        tx.commit()?;
        Ok(())
    }
}
