//! RecordStore — redb-backed persistence for deployment records.
//!
//! Records are JSON-serialized into redb's `&[u8]` value column, keyed by
//! tag. Every mutation is a read-check-write inside one write transaction,
//! which is what makes `create` an atomic idempotency gate and keeps status
//! transitions monotonic under concurrent callers.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::DEPLOYMENTS;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe record store backed by redb.
#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Database>,
}

impl RecordStore {
    /// Open (or create) a persistent record store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "record store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory record store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory record store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert a new `pending` record for `tag`.
    ///
    /// Fails with [`StateError::AlreadyExists`] if the tag has ever been
    /// used. The existence check and the insert share one write
    /// transaction.
    pub fn create(&self, tag: &str, service_name: Option<&str>) -> StateResult<DeploymentRecord> {
        let record = DeploymentRecord::pending(tag, service_name, unix_now());
        let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            if table.get(tag).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::AlreadyExists(tag.to_string()));
            }
            table
                .insert(record.table_key(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%tag, "deployment record created");
        Ok(record)
    }

    /// Get a record by tag.
    pub fn get(&self, tag: &str) -> StateResult<DeploymentRecord> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        match table.get(tag).map_err(map_err!(Read))? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize)),
            None => Err(StateError::NotFound(tag.to_string())),
        }
    }

    /// Record the remote handle and new status after a successful submission.
    ///
    /// The handle is write-once: setting the same handle again is accepted,
    /// replacing it with a different one is not.
    pub fn set_handle_and_status(
        &self,
        tag: &str,
        handle: &str,
        status: DeploymentStatus,
    ) -> StateResult<DeploymentRecord> {
        self.mutate(tag, |record| {
            if let Some(existing) = &record.remote_handle {
                if existing != handle {
                    return Err(StateError::HandleAlreadySet {
                        tag: tag.to_string(),
                        existing: existing.clone(),
                    });
                }
            }
            check_transition(record, status)?;
            let changed = record.remote_handle.is_none() || record.status != status;
            record.remote_handle = Some(handle.to_string());
            record.status = status;
            Ok(changed)
        })
    }

    /// Update the status of a record. Unchanged status is a no-op.
    pub fn set_status(&self, tag: &str, status: DeploymentStatus) -> StateResult<DeploymentRecord> {
        self.mutate(tag, |record| {
            check_transition(record, status)?;
            if record.status == status {
                return Ok(false);
            }
            record.status = status;
            Ok(true)
        })
    }

    /// Read-modify-write a record in one transaction. `apply` returns whether
    /// anything changed; unchanged records are not rewritten.
    fn mutate<F>(&self, tag: &str, apply: F) -> StateResult<DeploymentRecord>
    where
        F: FnOnce(&mut DeploymentRecord) -> StateResult<bool>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record = {
            let mut table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            let raw = table
                .get(tag)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_vec())
                .ok_or_else(|| StateError::NotFound(tag.to_string()))?;
            let mut record: DeploymentRecord =
                serde_json::from_slice(&raw).map_err(map_err!(Deserialize))?;

            if !apply(&mut record)? {
                return Ok(record);
            }
            record.updated_at = unix_now().max(record.created_at);

            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(tag, value.as_slice())
                .map_err(map_err!(Write))?;
            record
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%tag, status = %record.status, "deployment record updated");
        Ok(record)
    }
}

fn check_transition(record: &DeploymentRecord, next: DeploymentStatus) -> StateResult<()> {
    if record.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(StateError::InvalidTransition {
            tag: record.tag.clone(),
            from: record.status,
            to: next,
        })
    }
}
