// src/path_classifier.rs
//
// Path normalization, validation and local/remote classification.
//
// Accepted forms:
//   ~/docs/a.txt           virtual root
//   docs/a.txt             relative, same as the virtual root
//   /srv/site/docs/a.txt   absolute; folded into the virtual form when under
//                          the local root, otherwise a plain OS path
//
// Classification runs once per operation and the resulting `StorageTarget`
// is threaded through it. Only local disk is checked here; remote existence is
// the caller's business.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::GatewayConfig;
use crate::constants::{DIRECTORY_MARKER_SUFFIX, MAX_PATH_LENGTH, VIRTUAL_ROOT_PREFIX};
use crate::error::{GatewayError, Result};

// Illegal on common local filesystems or in object keys.
static ILLEGAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"|?*\x00-\x1F]"#).expect("valid regex"));

/// A validated path in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormalizedPath {
    /// Forward-slash path relative to the virtual root; doubles as the object key.
    /// The empty string is the root itself.
    Virtual(String),
    /// OS path outside the local root. Always local.
    Absolute(PathBuf),
}

impl NormalizedPath {
    /// The string whose length is bounded by `MAX_PATH_LENGTH`.
    pub fn as_normalized_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            NormalizedPath::Virtual(rel) => std::borrow::Cow::Borrowed(rel.as_str()),
            NormalizedPath::Absolute(p) => p.to_string_lossy(),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, NormalizedPath::Virtual(rel) if rel.is_empty())
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedPath::Virtual(rel) => write!(f, "{}{}", VIRTUAL_ROOT_PREFIX, rel),
            NormalizedPath::Absolute(p) => write!(f, "{}", p.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTarget {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub key: String,
}

/// Where an operation on a path is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    Local(LocalTarget),
    Remote(RemoteTarget),
}

impl StorageTarget {
    pub fn is_local(&self) -> bool {
        matches!(self, StorageTarget::Local(_))
    }
}

/// Normalized path plus its classification.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub normalized: NormalizedPath,
    pub target: StorageTarget,
}

impl ResolvedPath {
    pub fn display(&self) -> String {
        self.normalized.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct PathClassifier {
    local_root: PathBuf,
    canonical_root: Option<PathBuf>,
    local_prefixes: Vec<String>,
}

impl PathClassifier {
    pub fn new(config: &GatewayConfig) -> Self {
        let local_prefixes = config
            .local_prefixes
            .iter()
            .map(|p| p.replace('\\', "/").trim_matches('/').to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            local_root: config.local_root.clone(),
            canonical_root: std::fs::canonicalize(&config.local_root).ok(),
            local_prefixes,
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// Validate and canonicalize `path`.
    ///
    /// Checks run in a fixed order: empty, illegal characters (including `..`
    /// segments), then length.
    pub fn normalize(&self, path: &str) -> Result<NormalizedPath> {
        if path.trim().is_empty() {
            return Err(GatewayError::invalid_path(path, "path is empty"));
        }
        if let Some(m) = ILLEGAL_CHARS.find(path) {
            return Err(GatewayError::invalid_path(path, format!("illegal character {:?}", m.as_str())));
        }

        let unified = path.replace('\\', "/");
        let normalized = if let Some(rest) = unified.strip_prefix(VIRTUAL_ROOT_PREFIX) {
            NormalizedPath::Virtual(Self::join_segments(path, rest)?)
        } else if unified == "~" {
            NormalizedPath::Virtual(String::new())
        } else if unified.starts_with('/') {
            let abs = format!("/{}", Self::join_segments(path, &unified)?);
            self.fold_into_root(PathBuf::from(abs))
        } else {
            NormalizedPath::Virtual(Self::join_segments(path, &unified)?)
        };

        let len = normalized.as_normalized_str().chars().count();
        if len > MAX_PATH_LENGTH {
            return Err(GatewayError::PathTooLong { path: path.to_string(), len, max: MAX_PATH_LENGTH });
        }
        Ok(normalized)
    }

    fn join_segments(original: &str, raw: &str) -> Result<String> {
        let mut out: Vec<&str> = Vec::new();
        for seg in raw.split('/') {
            match seg {
                "" | "." => continue,
                ".." => return Err(GatewayError::invalid_path(original, "`..` segments are not allowed")),
                s => out.push(s),
            }
        }
        Ok(out.join("/"))
    }

    /// Absolute paths under the local root become virtual paths.
    fn fold_into_root(&self, abs: PathBuf) -> NormalizedPath {
        let roots = std::iter::once(&self.local_root).chain(self.canonical_root.iter());
        for root in roots {
            if !root.is_absolute() {
                continue;
            }
            if let Ok(rel) = abs.strip_prefix(root) {
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                return NormalizedPath::Virtual(rel);
            }
        }
        NormalizedPath::Absolute(abs)
    }

    fn matches_local_prefix(&self, rel: &str) -> bool {
        let lower = rel.to_ascii_lowercase();
        self.local_prefixes.iter().any(|prefix| {
            lower == *prefix || (lower.starts_with(prefix.as_str()) && lower[prefix.len()..].starts_with('/'))
        })
    }

    /// OS location of a normalized path.
    pub fn local_path(&self, normalized: &NormalizedPath) -> PathBuf {
        match normalized {
            NormalizedPath::Virtual(rel) if rel.is_empty() => self.local_root.clone(),
            NormalizedPath::Virtual(rel) => self.local_root.join(rel),
            NormalizedPath::Absolute(p) => p.clone(),
        }
    }

    /// Route a normalized path: local disk first, everything else remote.
    pub fn classify(&self, normalized: &NormalizedPath) -> StorageTarget {
        match normalized {
            NormalizedPath::Absolute(p) => StorageTarget::Local(LocalTarget { path: p.clone() }),
            NormalizedPath::Virtual(rel) => {
                let path = self.local_path(normalized);
                if rel.is_empty() || self.matches_local_prefix(rel) || path.symlink_metadata().is_ok() {
                    StorageTarget::Local(LocalTarget { path })
                } else {
                    StorageTarget::Remote(RemoteTarget { key: rel.clone() })
                }
            }
        }
    }

    pub fn resolve(&self, path: &str) -> Result<ResolvedPath> {
        let normalized = self.normalize(path)?;
        let target = self.classify(&normalized);
        Ok(ResolvedPath { normalized, target })
    }

    /// True iff `path` names a directory placeholder object.
    pub fn is_directory_placeholder(path: &str) -> bool {
        path.ends_with(DIRECTORY_MARKER_SUFFIX)
    }

    /// Case-insensitive comparison of normalized forms.
    pub fn same_location(a: &NormalizedPath, b: &NormalizedPath) -> bool {
        a.to_string().to_lowercase() == b.to_string().to_lowercase()
    }
}
