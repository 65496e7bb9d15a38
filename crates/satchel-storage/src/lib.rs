// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory SQLite sessions with blob-store durability.
//!
//! satchel-storage bridges an in-memory SQL engine, which has no disk
//! persistence of its own, to a local key-value blob store. The whole
//! database is rehydrated from a serialized snapshot at open and
//! re-serialized after every committing mutation; a readiness gate suspends
//! early callers until asynchronous initialization completes; a transaction
//! coordinator provides atomic multi-statement execution with rollback.

pub mod blob;
pub mod readiness;
pub mod session;

mod engine;
mod rows;
mod transaction;

pub use blob::{FsBlobStore, MemoryBlobStore};
pub use readiness::ReadyState;
pub use session::{Database, InitHook, OpenOptions};
