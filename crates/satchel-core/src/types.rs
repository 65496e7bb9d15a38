// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the satchel crates.

use serde::{Deserialize, Serialize};

/// A result row materialized into a keyed record, one entry per column.
///
/// SQLite `NULL`/`INTEGER`/`REAL`/`TEXT` map to the corresponding JSON
/// values; `BLOB` columns are encoded as base64 text.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Mutation counters reported by `run`, read in the same engine turn as the
/// statement they describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Rowid of the most recent successful INSERT on the connection.
    pub last_insert_rowid: i64,
    /// Rows affected by the just-executed statement.
    pub changes: u64,
}

/// Storage section of the application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding one snapshot blob per database name.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}
