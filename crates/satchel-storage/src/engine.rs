// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory SQLite engine lifecycle and snapshot transport.
//!
//! Exactly one engine exists per open database handle; no pooling. All
//! statements are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for the same
//! logical database.
//!
//! Snapshots move through a scratch file using SQLite's backup API in both
//! directions: the engine has no disk persistence of its own, so the full
//! database image is the unit of durability.

use std::path::Path;
use std::time::Duration;

use rusqlite::OpenFlags;
use rusqlite::backup::Backup;
use satchel_core::SatchelError;
use tokio_rusqlite::Connection;
use tracing::debug;

/// Pages copied per backup step when moving state between the in-memory
/// engine and the scratch file.
const BACKUP_PAGES_PER_STEP: std::ffi::c_int = 100;

/// Map a tokio-rusqlite call failure into the crate error type.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> SatchelError {
    SatchelError::Query {
        source: Box::new(e),
    }
}

fn init_err(e: impl std::error::Error + Send + Sync + 'static) -> SatchelError {
    SatchelError::Initialization {
        source: Box::new(e),
    }
}

fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> SatchelError {
    SatchelError::Storage {
        source: Box::new(e),
    }
}

/// One in-memory SQLite instance.
///
/// Invariant: a snapshot produced by [`Engine::snapshot`] and loaded into a
/// fresh engine via [`Engine::from_snapshot`] reproduces an equivalent
/// queryable state (same schema, same rows) as at save time.
pub(crate) struct Engine {
    conn: Connection,
}

impl Engine {
    /// Open a fresh, empty in-memory engine.
    pub(crate) async fn new() -> Result<Self, SatchelError> {
        let conn = Connection::open_in_memory().await.map_err(init_err)?;
        Ok(Self { conn })
    }

    /// Open an engine pre-loaded from a serialized snapshot.
    ///
    /// The bytes are written to a scratch file and copied into the in-memory
    /// database with the backup API. Fails if the blob is not a valid
    /// database image; the caller decides the fallback policy.
    pub(crate) async fn from_snapshot(bytes: &[u8]) -> Result<Self, SatchelError> {
        let engine = Self::new().await?;

        let dir = tempfile::tempdir().map_err(init_err)?;
        let path = dir.path().join("hydrate.db");
        tokio::fs::write(&path, bytes).await.map_err(init_err)?;

        engine
            .conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let src = rusqlite::Connection::open_with_flags(
                    &path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )?;
                let backup = Backup::new(&src, conn)?;
                backup.run_to_completion(BACKUP_PAGES_PER_STEP, Duration::ZERO, None)?;
                Ok(())
            })
            .await
            .map_err(init_err)?;

        debug!(bytes = bytes.len(), "engine hydrated from snapshot");
        Ok(engine)
    }

    /// Serialize the complete current engine state to an opaque byte blob.
    ///
    /// Full-snapshot cost is O(database size) per call. This is the single
    /// place the serialization strategy lives; an incremental strategy could
    /// replace it without touching the consumer API.
    pub(crate) async fn snapshot(&self) -> Result<Vec<u8>, SatchelError> {
        let dir = tempfile::tempdir().map_err(storage_err)?;
        let path = dir.path().join("snapshot.db");

        let backup_path = path.clone();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                write_snapshot_file(conn, &backup_path)
            })
            .await
            .map_err(storage_err)?;

        let bytes = tokio::fs::read(&path).await.map_err(storage_err)?;
        Ok(bytes)
    }

    /// Access to the underlying connection for call closures.
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn write_snapshot_file(conn: &rusqlite::Connection, path: &Path) -> Result<(), rusqlite::Error> {
    let mut dst = rusqlite::Connection::open(path)?;
    let backup = Backup::new(conn, &mut dst)?;
    backup.run_to_completion(BACKUP_PAGES_PER_STEP, Duration::ZERO, None)?;
    Ok(())
}
