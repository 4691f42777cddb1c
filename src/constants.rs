// src/constants.rs
//
// Centralized constants for storegate to avoid hardcoded values throughout the codebase

/// Maximum length (in characters) of a normalized path.
///
/// Matches the historical local-filesystem limit; anything longer is rejected
/// with `PathTooLong` before a backend is touched.
pub const MAX_PATH_LENGTH: usize = 259;

/// Prefix marking a path as relative to the virtual root.
pub const VIRTUAL_ROOT_PREFIX: &str = "~/";

/// Reserved key suffix for directory placeholder objects.
///
/// `docs/reports` is represented by the zero-length object `docs/reports_$folder$`;
/// the root directory by `_$folder$`.
pub const DIRECTORY_MARKER_SUFFIX: &str = "_$folder$";

// ============================================================================
// Metadata keys persisted on remote objects
// ============================================================================
//
// The object store has no typed metadata, so every value below is stored as a
// string: timestamps as RFC 3339 UTC, attributes as a decimal bitmask, the lock
// as the id of the owning multipart session.

/// Creation time of the object (RFC 3339).
pub const META_CREATION_TIME: &str = "creation-time";

/// Last write time of the object (RFC 3339).
pub const META_LAST_WRITE_TIME: &str = "last-write-time";

/// Attribute bitmask (decimal string).
pub const META_ATTRIBUTES: &str = "attributes";

/// Advisory lock flag; holds the owning session id while set.
pub const META_LOCK_OWNER: &str = "lock-owner";

// ============================================================================
// Multipart upload bounds
// ============================================================================

/// Minimum multipart upload part size (5 MiB - S3-compatible stores)
/// Only the final part of a session may be smaller.
pub const DEFAULT_MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Maximum multipart upload part size (5 GiB - S3-compatible stores)
pub const DEFAULT_MAX_PART_SIZE: usize = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts in a multipart upload
pub const MAX_MULTIPART_PARTS: usize = 10000;

// ============================================================================
// Misc
// ============================================================================

/// Buffer size used when streaming between a local file and a caching stream (1 MB)
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 1024 * 1024;

/// Default lifetime of signed download URLs (1 hour)
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

/// Prefix for temp files backing object streams
pub const TEMP_FILE_PREFIX: &str = "storegate-";

/// Default container name when none is configured
pub const DEFAULT_CONTAINER: &str = "content";
