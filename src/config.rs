// src/config.rs
//
// Runtime configuration for the gateway.
//
// Everything has a usable default; `from_env()` overlays `STOREGATE_*`
// variables (after loading an optional `.env` file).

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_CONTAINER, DEFAULT_SIGNED_URL_TTL_SECS};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Directory that `~/` and relative paths resolve against on local disk.
    pub local_root: PathBuf,
    /// Remote container (bucket) that object keys live in.
    pub container: String,
    /// Where caching streams put their temp files. `None` = OS temp dir.
    pub temp_dir: Option<PathBuf>,
    /// Virtual path prefixes that always stay on local disk (e.g. `App_Data/`).
    pub local_prefixes: Vec<String>,
    /// Container is publicly readable: derive direct URLs instead of signed ones.
    pub public_container: bool,
    /// Base URL for direct links to a public container.
    pub public_base_url: Option<String>,
    /// Lifetime of signed download URLs.
    pub signed_url_ttl: Duration,
    /// Override the store-advertised minimum part size.
    pub min_part_size: Option<usize>,
    /// Override the store-advertised maximum part size.
    pub max_part_size: Option<usize>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            local_root: PathBuf::from("."),
            container: DEFAULT_CONTAINER.to_string(),
            temp_dir: None,
            local_prefixes: Vec::new(),
            public_container: false,
            public_base_url: None,
            signed_url_ttl: Duration::from_secs(DEFAULT_SIGNED_URL_TTL_SECS),
            min_part_size: None,
            max_part_size: None,
        }
    }
}

impl GatewayConfig {
    pub fn new(local_root: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            local_root: local_root.into(),
            container: container.into(),
            ..Default::default()
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_local_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.local_prefixes.push(prefix.into());
        self
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_container = true;
        self.public_base_url = Some(url.into());
        self
    }

    pub fn with_part_sizes(mut self, min: usize, max: usize) -> Self {
        self.min_part_size = Some(min);
        self.max_part_size = Some(max);
        self
    }

    /// Temp directory for caching streams.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(env::temp_dir)
    }

    /// Build a configuration from `STOREGATE_*` environment variables.
    ///
    /// Loads `.env` first (variables already set win). Unset variables keep
    /// their defaults; malformed numbers and durations are errors.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();

        if let Ok(v) = env::var("STOREGATE_LOCAL_ROOT") {
            cfg.local_root = PathBuf::from(v);
        }
        if let Ok(v) = env::var("STOREGATE_CONTAINER") {
            cfg.container = v;
        }
        if let Ok(v) = env::var("STOREGATE_TEMP_DIR") {
            cfg.temp_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = env::var("STOREGATE_LOCAL_PREFIXES") {
            cfg.local_prefixes = v
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }
        if let Ok(v) = env::var("STOREGATE_PUBLIC_CONTAINER") {
            cfg.public_container = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = env::var("STOREGATE_PUBLIC_BASE_URL") {
            cfg.public_base_url = Some(v);
        }
        if let Ok(v) = env::var("STOREGATE_SIGNED_URL_TTL") {
            cfg.signed_url_ttl = humantime::parse_duration(&v)
                .with_context(|| format!("Invalid STOREGATE_SIGNED_URL_TTL: {}", v))?;
        }
        if let Ok(v) = env::var("STOREGATE_MIN_PART_SIZE") {
            cfg.min_part_size = Some(v.parse().with_context(|| format!("Invalid STOREGATE_MIN_PART_SIZE: {}", v))?);
        }
        if let Ok(v) = env::var("STOREGATE_MAX_PART_SIZE") {
            cfg.max_part_size = Some(v.parse().with_context(|| format!("Invalid STOREGATE_MAX_PART_SIZE: {}", v))?);
        }

        Ok(cfg)
    }

    /// Root directory of the reference file-backed store (`STOREGATE_STORE_ROOT`).
    pub fn store_root_from_env() -> Option<PathBuf> {
        env::var("STOREGATE_STORE_ROOT").ok().map(PathBuf::from)
    }
}
