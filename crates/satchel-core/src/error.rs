// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the satchel storage layer.

use thiserror::Error;

/// The primary error type used across satchel crates.
///
/// Propagation policy: the only locally recovered failures are "no prior
/// snapshot" (expected first run) and "stored snapshot not loadable" (logged,
/// falls back to an empty engine). Everything else surfaces to the caller.
#[derive(Debug, Error)]
pub enum SatchelError {
    /// Engine construction or session initialization failed. Fatal; surfaced
    /// at application startup. Operations on a session whose initialization
    /// failed also return this variant.
    #[error("initialization error: {source}")]
    Initialization {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Blob store read/write failure. Read failures during hydration are
    /// recovered as "absent"; write failures always surface, since a failed
    /// persist risks silent data loss.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Malformed SQL, constraint violation, or any other failure reported by
    /// the engine. Surfaced verbatim.
    #[error("query error: {source}")]
    Query {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failure raised by a transactional work closure. The transaction has
    /// already been rolled back when this is returned; the original failure
    /// is preserved as `source`.
    #[error("transaction failed: {source}")]
    Transaction {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
