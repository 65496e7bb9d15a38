// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blob store trait for snapshot persistence backends.

use async_trait::async_trait;

use crate::error::SatchelError;

/// A persistent key-value store holding one opaque snapshot blob per
/// database name.
///
/// This is the sole durability boundary of the storage layer: the in-memory
/// engine has no disk persistence of its own, so the entire serialized
/// database state is written here after every committing mutation and read
/// back exactly once, at open time. The store is shared across database
/// handles but keyed by name, so handles never interfere with each other.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Fetch the stored blob for `name`.
    ///
    /// Returns `None` when no blob exists. This is the expected first-run
    /// condition, not a fault.
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, SatchelError>;

    /// Overwrite the single stored blob for `name`.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), SatchelError>;

    /// Remove the stored blob for `name`. Removing an absent blob is a no-op.
    async fn delete(&self, name: &str) -> Result<(), SatchelError>;
}
