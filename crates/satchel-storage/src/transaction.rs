// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic multi-statement execution on top of the single-connection engine.
//!
//! The engine's native transactions are single-level and non-durable; the
//! coordinator layers two guarantees on top: rollback on any failure raised
//! by the work closure, and a snapshot persist after a successful commit so
//! the stored blob always reflects a committed state. A failed transaction
//! leaves the stored blob untouched.
//!
//! Re-entrancy: the work closure is synchronous and runs on the engine's
//! single background thread, so it cannot call back into the async consumer
//! API at all; re-entrant BEGIN is unrepresentable rather than detected at
//! runtime. Transaction scopes from concurrent tasks queue FIFO on the
//! per-handle lock; at most one scope is ever active.

use rusqlite::TransactionBehavior;
use satchel_core::SatchelError;
use tracing::{debug, warn};

use crate::engine::map_tr_err;
use crate::session::{Database, persist};

impl Database {
    /// Run `work` inside a transaction.
    ///
    /// On success the transaction is committed and the post-commit state is
    /// persisted before the scope is released. On any error from `work` the
    /// transaction is rolled back and the original failure is returned
    /// unchanged as the source of [`SatchelError::Transaction`].
    pub async fn with_transaction<F, T>(&self, work: F) -> Result<T, SatchelError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        self.transact(TransactionBehavior::Deferred, work).await
    }

    /// Run `work` inside an exclusive transaction.
    ///
    /// Same contract as [`Database::with_transaction`], additionally
    /// guaranteeing that no other transaction is interleaved. The engine is
    /// single-threaded and single-connection, so this holds structurally;
    /// the distinction is part of the API contract, not a separate locking
    /// mechanism.
    pub async fn with_exclusive_transaction<F, T>(&self, work: F) -> Result<T, SatchelError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        self.transact(TransactionBehavior::Exclusive, work).await
    }

    async fn transact<F, T>(&self, behavior: TransactionBehavior, work: F) -> Result<T, SatchelError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.gate.wait_ready().await?;

        // Held across the persist so snapshot writes are ordered with
        // transaction scopes and plain mutations alike.
        let _scope = self.inner.write_lock.lock().await;

        let outcome = self
            .inner
            .engine()?
            .connection()
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(behavior)?;
                match work(&tx) {
                    Ok(value) => {
                        tx.commit()?;
                        Ok(Ok(value))
                    }
                    Err(e) => {
                        if let Err(rollback_err) = tx.rollback() {
                            warn!(error = %rollback_err, "rollback failed");
                        }
                        Ok(Err(e))
                    }
                }
            })
            .await
            .map_err(map_tr_err)?;

        match outcome {
            Ok(value) => {
                persist(&self.inner).await?;
                debug!(name = %self.inner.name, "transaction committed");
                Ok(value)
            }
            Err(e) => Err(SatchelError::Transaction {
                source: Box::new(e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::session::{InitHook, OpenOptions};
    use satchel_core::BlobStore;
    use serde_json::json;
    use std::sync::Arc;

    fn items_migration() -> InitHook {
        Box::new(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS items (id INTEGER PRIMARY KEY, done INT, value TEXT)",
            )
        })
    }

    fn open_items_db(store: &MemoryBlobStore) -> Database {
        Database::open(
            "test.db",
            Arc::new(store.clone()),
            OpenOptions {
                on_init: Some(items_migration()),
            },
        )
    }

    #[tokio::test]
    async fn commit_applies_all_statements_and_persists() {
        let store = MemoryBlobStore::new();
        let db = open_items_db(&store);

        let inserted = db
            .with_transaction(|tx| {
                tx.execute("INSERT INTO items (done, value) VALUES (0, 'a')", [])?;
                tx.execute("INSERT INTO items (done, value) VALUES (1, 'b')", [])?;
                Ok(tx.last_insert_rowid())
            })
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        // The committed state is durable: a restart sees both rows.
        let reopened = open_items_db(&store);
        let rows = reopened.get_all("SELECT * FROM items", &[]).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn failure_rolls_back_every_statement() {
        let store = MemoryBlobStore::new();
        let db = open_items_db(&store);
        db.run("INSERT INTO items (done, value) VALUES (0, 'kept')", &[])
            .await
            .unwrap();

        let result: Result<(), SatchelError> = db
            .with_transaction(|tx| {
                tx.execute("INSERT INTO items (done, value) VALUES (0, 'gone')", [])?;
                tx.execute("INSERT INTO items (done, value) VALUES (0, 'gone too')", [])?;
                Err(rusqlite::Error::InvalidQuery)
            })
            .await;
        assert!(matches!(result, Err(SatchelError::Transaction { .. })));

        let rows = db.get_all("SELECT * FROM items", &[]).await.unwrap();
        assert_eq!(rows.len(), 1, "rolled-back inserts must not be visible");
        assert_eq!(rows[0].get("value"), Some(&json!("kept")));
    }

    #[tokio::test]
    async fn failed_transaction_leaves_stored_snapshot_untouched() {
        let store = MemoryBlobStore::new();
        let db = open_items_db(&store);
        db.run("INSERT INTO items (done, value) VALUES (0, 'kept')", &[])
            .await
            .unwrap();
        let before = store.get("test.db").await.unwrap().unwrap();

        let result: Result<(), SatchelError> = db
            .with_transaction(|tx| {
                tx.execute("INSERT INTO items (done, value) VALUES (0, 'gone')", [])?;
                Err(rusqlite::Error::InvalidQuery)
            })
            .await;
        assert!(result.is_err());

        let after = store.get("test.db").await.unwrap().unwrap();
        assert_eq!(before, after, "no partial snapshot write on rollback");

        let reopened = open_items_db(&store);
        let rows = reopened.get_all("SELECT * FROM items", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn exclusive_transaction_has_the_same_contract() {
        let store = MemoryBlobStore::new();
        let db = open_items_db(&store);

        let count: i64 = db
            .with_exclusive_transaction(|tx| {
                tx.execute("INSERT INTO items (done, value) VALUES (0, 'x')", [])?;
                tx.query_row("SELECT count(*) FROM items", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn concurrent_scopes_serialize_one_at_a_time() {
        let store = MemoryBlobStore::new();
        let db = open_items_db(&store);
        db.exec("CREATE TABLE counters (n INT); INSERT INTO counters VALUES (0);")
            .await
            .unwrap();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.with_transaction(|tx| {
                        let n: i64 =
                            tx.query_row("SELECT n FROM counters", [], |row| row.get(0))?;
                        tx.execute("UPDATE counters SET n = ?1", [n + 1])?;
                        Ok(())
                    })
                    .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let row = db
            .get_first("SELECT n FROM counters", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get("n"), Some(&json!(4)));
    }

    #[tokio::test]
    async fn transaction_waits_for_readiness() {
        let store = MemoryBlobStore::new();
        let db = open_items_db(&store);

        // Issued immediately after open, before the background
        // initialization has necessarily finished.
        db.with_transaction(|tx| {
            tx.execute("INSERT INTO items (done, value) VALUES (0, 'early')", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let rows = db.get_all("SELECT * FROM items", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
