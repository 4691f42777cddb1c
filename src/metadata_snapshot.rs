// src/metadata_snapshot.rs
//
// Point-in-time view of a file's size, timestamps and attributes, built from
// whichever backend the path lives on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::attributes::FileAttributes;
use crate::directory::DirectoryPlaceholder;
use crate::error::{GatewayError, Result};
use crate::object_descriptor::ObjectDescriptor;
use crate::object_store::ObjectStore;
use crate::path_classifier::{ResolvedPath, StorageTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Backend {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMetadataSnapshot {
    pub path: String,
    pub backend: Backend,
    pub exists: bool,
    pub size: u64,
    pub creation_time: Option<DateTime<Utc>>,
    pub last_write_time: Option<DateTime<Utc>>,
    pub attributes: FileAttributes,
}

impl FileMetadataSnapshot {
    fn missing(path: &str, backend: Backend) -> Self {
        Self {
            path: path.to_string(),
            backend,
            exists: false,
            size: 0,
            creation_time: None,
            last_write_time: None,
            attributes: FileAttributes::empty(),
        }
    }

    /// Snapshot of a resolved path. Missing targets give `exists == false`.
    pub fn capture(resolved: &ResolvedPath, store: &Arc<dyn ObjectStore>) -> Result<Self> {
        let display = resolved.display();
        match &resolved.target {
            StorageTarget::Local(local) => Self::from_local(&display, &local.path),
            StorageTarget::Remote(remote) => {
                let mut descriptor = ObjectDescriptor::new(Arc::clone(store), remote.key.clone());
                Self::from_object(&display, &mut descriptor)
            }
        }
    }

    pub fn from_local(display: &str, path: &Path) -> Result<Self> {
        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::missing(display, Backend::Local)),
            Err(e) => return Err(GatewayError::from_io(e, display)),
        };
        let file_name = path.file_name().and_then(|n| n.to_str());
        Ok(Self {
            path: display.to_string(),
            backend: Backend::Local,
            exists: true,
            size: if meta.is_dir() { 0 } else { meta.len() },
            // Not every filesystem records a birth time.
            creation_time: meta.created().ok().map(DateTime::<Utc>::from),
            last_write_time: meta.modified().ok().map(DateTime::<Utc>::from),
            attributes: FileAttributes::from_local(&meta, file_name),
        })
    }

    /// Snapshot of an object, falling back to its directory placeholder when
    /// the key names a directory rather than an object.
    pub fn from_object(display: &str, descriptor: &mut ObjectDescriptor) -> Result<Self> {
        if let Some(stat) = descriptor.stat()? {
            return Ok(Self {
                path: display.to_string(),
                backend: Backend::Remote,
                exists: true,
                size: stat.size,
                creation_time: descriptor.creation_time()?,
                last_write_time: descriptor.last_write_time()?,
                attributes: descriptor.attributes()?.or_normal(),
            });
        }

        let mut dir = DirectoryPlaceholder::for_directory(descriptor, descriptor.key());
        if dir.exists()? {
            return Ok(Self {
                path: display.to_string(),
                backend: Backend::Remote,
                exists: true,
                size: 0,
                creation_time: dir.creation_time()?,
                last_write_time: dir.last_write_time()?,
                attributes: FileAttributes::DIRECTORY,
            });
        }
        Ok(Self::missing(display, Backend::Remote))
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes.contains(FileAttributes::READ_ONLY)
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }
}
