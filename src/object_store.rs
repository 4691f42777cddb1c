// src/object_store.rs
//
// Pluggable object-store abstraction used underneath the gateway.
//
// The gateway only ever talks to the store through `ObjectDescriptor`; this
// trait is the whole contract a backend has to satisfy. Keys are relative to
// the container the store was built for.

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

use crate::constants::{DEFAULT_MAX_PART_SIZE, DEFAULT_MIN_PART_SIZE};

/// Provider-neutral object stat (HEAD-like).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub e_tag: Option<String>,
    /// Backend modification time, RFC 3339. Independent of the gateway's own
    /// `last-write-time` metadata.
    pub last_modified: Option<String>,
}

/// Part-size bounds advertised by a store. Only the final part of a multipart
/// upload may be smaller than `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSizeBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for PartSizeBounds {
    fn default() -> Self {
        Self { min: DEFAULT_MIN_PART_SIZE, max: DEFAULT_MAX_PART_SIZE }
    }
}

/// One committed part: number plus the backend-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub part_id: String,
}

/// ObjectStore trait for pluggable storage backends.
///
/// Absence is never an error: `get`/`stat`/`get_metadata` return `None` and
/// `delete` of a missing key succeeds. Errors are reserved for the backend
/// itself failing (missing container, I/O, rejected part sizes).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the container this store is bound to.
    fn container(&self) -> &str;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get entire object into memory.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Put object data, replacing any previous content. Metadata is kept.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Delete a single object together with its metadata.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Backend-native object-to-object copy. Metadata is not carried over.
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()>;

    /// List keys under a prefix. Non-recursive listing stops at the next `/`.
    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>>;

    /// Stat a single object.
    async fn stat(&self, key: &str) -> Result<Option<ObjectStat>>;

    /// Read all metadata entries of an object (empty map if it has none).
    async fn get_metadata(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Merge `entries` into the object's metadata. `None` values remove a key.
    async fn set_metadata(&self, key: &str, entries: &[(String, Option<String>)]) -> Result<()>;

    /// Conditionally set one metadata entry: succeeds (returns `true`) only if
    /// the current value equals `expected`.
    ///
    /// The default is a plain read-then-write and therefore only advisory;
    /// backends with a conditional-write primitive should override it.
    async fn compare_and_set_metadata(
        &self,
        key: &str,
        name: &str,
        expected: Option<&str>,
        value: Option<&str>,
    ) -> Result<bool> {
        let current = self.get_metadata(key).await?;
        if current.get(name).map(String::as_str) != expected {
            return Ok(false);
        }
        self.set_metadata(key, &[(name.to_string(), value.map(str::to_string))]).await?;
        Ok(true)
    }

    /// Start a multipart upload, returning the upload id.
    async fn create_multipart(&self, key: &str) -> Result<String>;

    /// Upload one part, returning its part id.
    async fn upload_part(&self, key: &str, upload_id: &str, part_number: u32, data: Bytes) -> Result<String>;

    /// Assemble the given parts (in order) into the object; returns the ETag.
    async fn complete_multipart(&self, key: &str, upload_id: &str, parts: &[CompletedPart]) -> Result<String>;

    /// Discard an unfinished multipart upload.
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<()>;

    /// Part-size bounds this backend enforces.
    fn part_size_bounds(&self) -> PartSizeBounds {
        PartSizeBounds::default()
    }

    /// Time-limited download URL for a non-public container.
    async fn signed_url(&self, key: &str, _expires_in: Duration) -> Result<String> {
        bail!("signed URLs are not supported by this store (key: {})", key)
    }

    /// Create the top-level container.
    async fn create_container(&self) -> Result<()>;
}
