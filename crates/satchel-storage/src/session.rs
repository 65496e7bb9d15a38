// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database session lifecycle and the consumer query API.
//!
//! A [`Database`] owns one in-memory engine plus its hydrate/persist
//! lifecycle: prior state is loaded from the blob store once at open, and
//! the full snapshot is rewritten after every committing mutation. Read-only
//! helpers never persist.
//!
//! Opening is non-blocking: the handle is returned immediately and
//! initialization runs on a background task. Every operation suspends on the
//! readiness gate first, so work issued before initialization completes
//! still executes correctly afterwards, in call order.

use std::sync::Arc;

use satchel_core::{BlobStore, Row, RunResult, SatchelError};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, warn};

use crate::engine::{Engine, map_tr_err};
use crate::readiness::{ReadinessGate, ReadyState};
use crate::rows;

/// Hook invoked exactly once per open, after hydration and before the
/// session is marked ready. Intended for schema migration.
pub type InitHook = Box<dyn FnOnce(&mut rusqlite::Connection) -> Result<(), rusqlite::Error> + Send>;

/// Options for [`Database::open`].
#[derive(Default)]
pub struct OpenOptions {
    pub on_init: Option<InitHook>,
}

pub(crate) struct SessionInner {
    pub(crate) name: String,
    pub(crate) store: Arc<dyn BlobStore>,
    // Set exactly once by the initialization task, before the gate opens.
    pub(crate) engine: OnceCell<Engine>,
    pub(crate) gate: ReadinessGate,
    // Serializes every mutation together with its snapshot persist, so
    // concurrent writers cannot install snapshots out of order. Writers
    // from concurrent tasks queue here in FIFO order; at most one
    // mutation-persist pair or transaction scope is active per handle.
    pub(crate) write_lock: Mutex<()>,
}

impl SessionInner {
    pub(crate) fn engine(&self) -> Result<&Engine, SatchelError> {
        self.engine.get().ok_or_else(|| SatchelError::Initialization {
            source: "engine not initialized".into(),
        })
    }
}

/// Handle to one logical database, identified by name.
///
/// Cheap to clone; all clones share the same session. The handle lives for
/// the process lifetime; an explicit close is a documented future
/// capability, not implemented here.
#[derive(Clone)]
pub struct Database {
    pub(crate) inner: Arc<SessionInner>,
}

impl Database {
    /// Open the named database against the given blob store.
    ///
    /// Returns the handle immediately; initialization (snapshot hydration,
    /// the `on_init` hook, the first persist) runs on a background task and
    /// every operation suspends until it completes. Must be called from
    /// within a tokio runtime.
    ///
    /// If initialization fails the session never becomes ready and every
    /// operation returns [`SatchelError::Initialization`]; callers never
    /// receive a handle that silently cannot execute.
    pub fn open(name: impl Into<String>, store: Arc<dyn BlobStore>, options: OpenOptions) -> Self {
        let inner = Arc::new(SessionInner {
            name: name.into(),
            store,
            engine: OnceCell::new(),
            gate: ReadinessGate::new(),
            write_lock: Mutex::new(()),
        });

        let task_inner = inner.clone();
        tokio::spawn(async move {
            if let Err(e) = initialize(&task_inner, options.on_init).await {
                error!(name = %task_inner.name, error = %e, "database initialization failed");
                task_inner.gate.advance(ReadyState::Failed(e.to_string()));
            }
        });

        Self { inner }
    }

    /// Current readiness state, for observability.
    pub fn state(&self) -> ReadyState {
        self.inner.gate.state()
    }

    /// Suspend until the session is ready to serve operations.
    ///
    /// Operations call this internally; it is public for application startup
    /// code that wants to surface initialization failures eagerly.
    pub async fn wait_ready(&self) -> Result<(), SatchelError> {
        self.inner.gate.wait_ready().await
    }

    /// Execute a batch of SQL statements, then persist.
    pub async fn exec(&self, sql: &str) -> Result<(), SatchelError> {
        self.inner.gate.wait_ready().await?;
        let sql = sql.to_string();
        let _scope = self.inner.write_lock.lock().await;
        self.inner
            .engine()?
            .connection()
            .call(move |conn| conn.execute_batch(&sql))
            .await
            .map_err(map_tr_err)?;
        persist(&self.inner).await
    }

    /// Execute a single statement with positional parameters, then persist.
    ///
    /// The returned counters are read in the same engine turn as the
    /// statement itself, before any other statement can touch them.
    pub async fn run(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<RunResult, SatchelError> {
        self.inner.gate.wait_ready().await?;
        let sql = sql.to_string();
        let params = rows::bind_values(params)?;
        let _scope = self.inner.write_lock.lock().await;
        let result = self
            .inner
            .engine()?
            .connection()
            .call(move |conn| {
                let changes = conn.execute(&sql, rusqlite::params_from_iter(params))?;
                Ok(RunResult {
                    last_insert_rowid: conn.last_insert_rowid(),
                    changes: changes as u64,
                })
            })
            .await
            .map_err(map_tr_err)?;
        persist(&self.inner).await?;
        Ok(result)
    }

    /// Fetch the first result row as a keyed record, or `None`. Read-only.
    pub async fn get_first(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Option<Row>, SatchelError> {
        self.inner.gate.wait_ready().await?;
        let sql = sql.to_string();
        let params = rows::bind_values(params)?;
        self.inner
            .engine()?
            .connection()
            .call(move |conn| {
                // The statement is released when the closure returns,
                // success or failure.
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();
                let mut result = stmt.query(rusqlite::params_from_iter(params))?;
                match result.next()? {
                    Some(row) => Ok(Some(rows::materialize(&columns, row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    /// Fetch all result rows as keyed records. Read-only.
    pub async fn get_all(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Vec<Row>, SatchelError> {
        self.inner.gate.wait_ready().await?;
        let sql = sql.to_string();
        let params = rows::bind_values(params)?;
        self.inner
            .engine()?
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();
                let mut result = stmt.query(rusqlite::params_from_iter(params))?;
                let mut records = Vec::new();
                while let Some(row) = result.next()? {
                    records.push(rows::materialize(&columns, row)?);
                }
                Ok(records)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Typed variant of [`Database::get_first`].
    pub async fn get_first_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Option<T>, SatchelError> {
        match self.get_first(sql, params).await? {
            Some(record) => Ok(Some(from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Typed variant of [`Database::get_all`].
    pub async fn get_all_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Vec<T>, SatchelError> {
        self.get_all(sql, params)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// Serialize the full current engine state and overwrite the stored
    /// blob for this database name.
    ///
    /// Called automatically after every committing mutation; public for
    /// explicit flush points. Write failures surface: a failed persist
    /// must never be swallowed.
    pub async fn persist(&self) -> Result<(), SatchelError> {
        self.inner.gate.wait_ready().await?;
        let _scope = self.inner.write_lock.lock().await;
        persist(&self.inner).await
    }
}

pub(crate) async fn persist(inner: &SessionInner) -> Result<(), SatchelError> {
    let bytes = inner.engine()?.snapshot().await?;
    inner.store.put(&inner.name, &bytes).await?;
    debug!(name = %inner.name, bytes = bytes.len(), "snapshot persisted");
    Ok(())
}

async fn initialize(inner: &SessionInner, on_init: Option<InitHook>) -> Result<(), SatchelError> {
    inner.gate.advance(ReadyState::Initializing);

    let engine = hydrate(inner).await?;

    if let Some(hook) = on_init {
        engine
            .connection()
            .call(move |conn| hook(conn))
            .await
            .map_err(|e| SatchelError::Initialization {
                source: Box::new(e),
            })?;
        debug!(name = %inner.name, "init hook complete");
    }

    inner
        .engine
        .set(engine)
        .map_err(|_| SatchelError::Initialization {
            source: "session initialized twice".into(),
        })?;

    // Establish a durable image covering the init hook's effects before any
    // caller can observe the session as ready.
    persist(inner).await?;

    inner.gate.advance(ReadyState::Ready);
    debug!(name = %inner.name, "database ready");
    Ok(())
}

/// Build the engine from the stored snapshot, if any.
///
/// Contract: a missing blob is the expected first-run condition; a read
/// failure or an unloadable blob is logged and treated the same way, never
/// merged and never escalated into a hard failure, since otherwise a single bad
/// blob would make the application permanently unbootable.
async fn hydrate(inner: &SessionInner) -> Result<Engine, SatchelError> {
    let snapshot = match inner.store.get(&inner.name).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(name = %inner.name, error = %e, "snapshot read failed; treating as absent");
            None
        }
    };

    match snapshot {
        Some(bytes) => match Engine::from_snapshot(&bytes).await {
            Ok(engine) => {
                debug!(name = %inner.name, bytes = bytes.len(), "hydrated from stored snapshot");
                Ok(engine)
            }
            Err(e) => {
                warn!(name = %inner.name, error = %e, "stored snapshot is not loadable; starting empty");
                Engine::new().await
            }
        },
        None => {
            debug!(name = %inner.name, "no stored snapshot; starting empty");
            Engine::new().await
        }
    }
}

fn from_record<T: DeserializeOwned>(record: Row) -> Result<T, SatchelError> {
    serde_json::from_value(serde_json::Value::Object(record)).map_err(|e| SatchelError::Query {
        source: Box::new(e),
    })
}
