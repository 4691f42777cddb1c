// src/directory.rs
//
// Directory placeholder objects.
//
// The object store has no directories. A directory is represented by a
// zero-length marker object whose key is the directory key plus a reserved
// suffix; its last-write-time says when a child was last created, deleted or
// renamed. Markers are created on first use and only removed on request.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::constants::DIRECTORY_MARKER_SUFFIX;
use crate::error::Result;
use crate::object_descriptor::ObjectDescriptor;

#[derive(Debug, Clone)]
pub struct DirectoryPlaceholder {
    dir_key: String,
    descriptor: ObjectDescriptor,
}

/// Marker key for directory `dir_key` (`""` is the root).
pub fn placeholder_key(dir_key: &str) -> String {
    format!("{}{}", dir_key.trim_end_matches('/'), DIRECTORY_MARKER_SUFFIX)
}

/// Directory part of an object key (`""` for top-level keys).
pub fn parent_dir_key(key: &str) -> &str {
    key.trim_end_matches('/').rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

impl DirectoryPlaceholder {
    /// Placeholder for `dir_key`, on the same store as `any`.
    pub fn for_directory(any: &ObjectDescriptor, dir_key: &str) -> Self {
        let dir_key = dir_key.trim_matches('/').to_string();
        let descriptor = any.sibling(placeholder_key(&dir_key));
        Self { dir_key, descriptor }
    }

    /// Placeholder of the directory containing `child`.
    pub fn for_parent_of(child: &ObjectDescriptor) -> Self {
        Self::for_directory(child, parent_dir_key(child.key()))
    }

    pub fn dir_key(&self) -> &str {
        &self.dir_key
    }

    pub fn key(&self) -> &str {
        self.descriptor.key()
    }

    pub fn exists(&self) -> Result<bool> {
        self.descriptor.exists()
    }

    /// Create the marker if missing. Returns true when it was created.
    pub fn ensure(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.descriptor.exists()? {
            return Ok(false);
        }
        debug!("creating directory placeholder {}", self.descriptor.key());
        self.descriptor.put_content(Bytes::new())?;
        self.descriptor.set_creation_time(now, false)?;
        Ok(true)
    }

    /// Record that a child of this directory changed at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure(now)?;
        self.descriptor.set_last_write_time(now, false)?;
        self.descriptor.flush()
    }

    pub fn last_write_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.descriptor.refresh();
        self.descriptor.last_write_time()
    }

    pub fn creation_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.descriptor.refresh();
        self.descriptor.creation_time()
    }

    /// Object keys directly inside this directory, markers excluded.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let keys = self.descriptor.list_prefix(&self.dir_key, false)?;
        Ok(keys.into_iter().filter(|k| !k.ends_with(DIRECTORY_MARKER_SUFFIX)).collect())
    }

    /// Explicitly remove the marker.
    pub fn delete(&mut self) -> Result<()> {
        self.descriptor.delete()
    }
}
