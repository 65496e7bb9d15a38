// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the satchel storage layer.
//!
//! This crate provides the error type, common types, and the [`BlobStore`]
//! trait shared across the satchel workspace. Storage backends implement
//! [`BlobStore`]; everything else lives in `satchel-storage`.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SatchelError;
pub use traits::BlobStore;
pub use types::{Row, RunResult, StorageConfig};
