// src/lib.rs
//
// Crate root: public re-exports.
//
// storegate gives one file API over a hybrid namespace. Paths under the local
// root that exist on disk stay on disk; everything else is an object in a
// remote container, with timestamps, attributes and directories emulated in
// object metadata and marker objects.

// ===== Core Public API =====

pub mod unified_file;
pub mod caching_stream;
pub mod multipart;
pub mod metadata_snapshot;

pub use unified_file::UnifiedFile;
pub use caching_stream::{CachingStream, FileAccess, FileMode};
pub use multipart::{MultipartCompleteInfo, MultipartUploadConfig, MultipartUploadCoordinator, SessionId};
pub use metadata_snapshot::{Backend, FileMetadataSnapshot};

// ===== Internal Modules (Implementation) =====
// Public for backends and tools; may change without notice.

pub mod constants;
pub mod config;
pub mod error;
pub mod attributes;
pub mod path_classifier;
pub mod object_descriptor;
pub mod directory;
pub mod object_store;
pub mod file_store;
pub mod runtime;

pub use attributes::FileAttributes;
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use object_store::{CompletedPart, ObjectStat, ObjectStore, PartSizeBounds};
pub use file_store::{FileSystemConfig, FileSystemObjectStore};
pub use path_classifier::{NormalizedPath, PathClassifier, ResolvedPath, StorageTarget};
pub use object_descriptor::ObjectDescriptor;
pub use directory::DirectoryPlaceholder;
