// src/file_store.rs
//
// FileSystemObjectStore: an ObjectStore backed by a local directory tree.
//
// Layout under `{root}/{container}/`:
//   <key>                          object content
//   .meta/<key>.json               metadata sidecar (string map)
//   .multipart/<upload_id>/        parts of an unfinished multipart upload
//   .tmp/                          staging area for atomic writes
//
// It behaves like a remote blob store (no append, no attributes, metadata as
// strings) which makes it the reference backend for tests and the CLI.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use crc32fast::Hasher;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::constants::{DEFAULT_MAX_PART_SIZE, DEFAULT_MIN_PART_SIZE};
use crate::object_store::{CompletedPart, ObjectStat, ObjectStore, PartSizeBounds};

const META_DIR: &str = ".meta";
const MULTIPART_DIR: &str = ".multipart";
const TMP_DIR: &str = ".tmp";
const UPLOAD_KEY_FILE: &str = ".key";

type HmacSha256 = Hmac<Sha256>;

/// Configuration for FileSystemObjectStore
#[derive(Debug, Clone)]
pub struct FileSystemConfig {
    /// Smallest non-final multipart part accepted at commit.
    pub min_part_size: usize,
    /// Largest part accepted by `upload_part`.
    pub max_part_size: usize,
    /// HMAC-SHA256 key for signed URLs.
    pub signing_secret: String,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            min_part_size: DEFAULT_MIN_PART_SIZE,
            max_part_size: DEFAULT_MAX_PART_SIZE,
            signing_secret: String::new(),
        }
    }
}

/// FileSystem adapter that implements ObjectStore on a directory tree.
#[derive(Clone)]
pub struct FileSystemObjectStore {
    root: PathBuf,
    container: String,
    config: Arc<FileSystemConfig>,
    // Serializes metadata read-modify-write so compare_and_set is atomic
    // for every handle cloned from this store.
    meta_lock: Arc<Mutex<()>>,
}

fn crc32_hex(data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    format!("crc32:{:08x}", hasher.finalize())
}

impl FileSystemObjectStore {
    /// Create a store for `container` under `root` with default configuration.
    /// The container directory is not created; see `create_container`.
    pub fn new(root: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self::with_config(root, container, FileSystemConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(root: impl Into<PathBuf>, container: impl Into<String>, config: FileSystemConfig) -> Self {
        Self {
            root: root.into(),
            container: container.into(),
            config: Arc::new(config),
            meta_lock: Arc::new(Mutex::new(())),
        }
    }

    fn container_dir(&self) -> PathBuf {
        self.root.join(&self.container)
    }

    async fn ensure_container(&self) -> Result<PathBuf> {
        let dir = self.container_dir();
        match fs::metadata(&dir).await {
            Ok(m) if m.is_dir() => Ok(dir),
            _ => bail!("container not found: {} ({})", self.container, dir.display()),
        }
    }

    /// Reject keys that would escape the container or collide with the
    /// store's own bookkeeping directories.
    fn check_key(key: &str) -> Result<()> {
        if key.is_empty() {
            bail!("empty object key");
        }
        for component in Path::new(key).components() {
            match component {
                Component::Normal(_) => {}
                _ => bail!("invalid object key: {}", key),
            }
        }
        let first = key.split('/').next().unwrap_or("");
        if first == META_DIR || first == MULTIPART_DIR || first == TMP_DIR {
            bail!("object key uses a reserved prefix: {}", key);
        }
        Ok(())
    }

    async fn object_path(&self, key: &str) -> Result<PathBuf> {
        Self::check_key(key)?;
        Ok(self.ensure_container().await?.join(key))
    }

    async fn meta_path(&self, key: &str) -> Result<PathBuf> {
        Self::check_key(key)?;
        Ok(self.ensure_container().await?.join(META_DIR).join(format!("{}.json", key)))
    }

    fn url_mac(&self, key: &str, expires: u64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.config.signing_secret.as_bytes())
            .map_err(|e| anyhow!("invalid signing secret: {}", e))?;
        mac.update(format!("{}|{}", key, expires).as_bytes());
        Ok(mac)
    }

    /// Check a signature produced by `signed_url` for `key`. Expired or
    /// malformed signatures fail.
    pub fn verify_signature(&self, key: &str, expires: u64, signature: &str) -> bool {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        if expires < now {
            return false;
        }
        let Ok(raw) = hex::decode(signature) else {
            return false;
        };
        self.url_mac(key, expires).is_ok_and(|mac| mac.verify_slice(&raw).is_ok())
    }

    async fn upload_dir(&self, upload_id: &str) -> Result<PathBuf> {
        if upload_id.is_empty() || upload_id.contains('/') || upload_id.contains("..") {
            bail!("invalid upload id: {}", upload_id);
        }
        Ok(self.ensure_container().await?.join(MULTIPART_DIR).join(upload_id))
    }

    /// Write via a staging file and rename, so readers never see a torn object.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let tmp_dir = self.container_dir().join(TMP_DIR);
        fs::create_dir_all(&tmp_dir).await?;
        let tmp_path = tmp_dir.join(format!("tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp_path, data)
            .await
            .with_context(|| format!("Failed to write staging file: {}", tmp_path.display()))?;
        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| format!("Failed to move object into place: {}", path.display()));
        }
        Ok(())
    }

    async fn read_meta(&self, key: &str) -> Result<HashMap<String, String>> {
        let path = self.meta_path(key).await?;
        match fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .with_context(|| format!("Corrupt metadata sidecar: {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read metadata: {}", path.display())),
        }
    }

    async fn write_meta(&self, key: &str, meta: &HashMap<String, String>) -> Result<()> {
        let path = self.meta_path(key).await?;
        if meta.is_empty() {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("Failed to remove metadata: {}", path.display())),
            }
            return Ok(());
        }
        let raw = serde_json::to_vec(meta)?;
        self.write_atomic(&path, &raw).await
    }

    fn apply_entries(meta: &mut HashMap<String, String>, entries: &[(String, Option<String>)]) {
        for (name, value) in entries {
            match value {
                Some(v) => {
                    meta.insert(name.clone(), v.clone());
                }
                None => {
                    meta.remove(name);
                }
            }
        }
    }

    /// Recursively collect object keys below `dir`, skipping bookkeeping dirs.
    async fn collect_keys(base: &Path, dir: &Path, recursive: bool, results: &mut Vec<String>) -> Result<()> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("Failed to list: {}", dir.display())),
        };

        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                let name = entry.file_name();
                if dir == base && (name == META_DIR || name == MULTIPART_DIR || name == TMP_DIR) {
                    continue;
                }
                if recursive {
                    Box::pin(Self::collect_keys(base, &entry_path, recursive, results)).await?;
                }
            } else if let Ok(rel) = entry_path.strip_prefix(base) {
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                results.push(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FileSystemObjectStore {
    fn container(&self) -> &str {
        &self.container
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key).await?;
        Ok(fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false))
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.object_path(key).await?;
        match fs::read(&path).await {
            Ok(data) => {
                trace!("FileSystemObjectStore::get {} ({} bytes)", key, data.len());
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read object: {}", path.display())),
        }
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.object_path(key).await?;
        debug!("FileSystemObjectStore::put {} ({} bytes)", key, data.len());
        self.write_atomic(&path, &data).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key).await?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            // Already deleted, consider it success
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to delete object: {}", path.display())),
        }
        let _guard = self.meta_lock.lock().await;
        self.write_meta(key, &HashMap::new()).await
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()> {
        let src = self.object_path(src_key).await?;
        let dst = self.object_path(dst_key).await?;
        let data = fs::read(&src)
            .await
            .with_context(|| format!("Source object not found: {}", src_key))?;
        self.write_atomic(&dst, &data).await?;
        // Metadata travels with the content and replaces the destination's.
        let _guard = self.meta_lock.lock().await;
        let meta = self.read_meta(src_key).await?;
        self.write_meta(dst_key, &meta).await
    }

    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        let base = self.ensure_container().await?;
        let prefix = prefix.trim_matches('/');
        let dir = if prefix.is_empty() {
            base.clone()
        } else {
            Self::check_key(prefix)?;
            base.join(prefix)
        };
        let mut results = Vec::new();
        Self::collect_keys(&base, &dir, recursive, &mut results).await?;
        results.sort();
        Ok(results)
    }

    async fn stat(&self, key: &str) -> Result<Option<ObjectStat>> {
        let path = self.object_path(key).await?;
        let metadata = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to stat object: {}", path.display())),
        };
        let data = fs::read(&path).await?;
        let last_modified = metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());
        Ok(Some(ObjectStat {
            size: metadata.len(),
            e_tag: Some(crc32_hex(&data)),
            last_modified,
        }))
    }

    async fn get_metadata(&self, key: &str) -> Result<HashMap<String, String>> {
        let _guard = self.meta_lock.lock().await;
        self.read_meta(key).await
    }

    async fn set_metadata(&self, key: &str, entries: &[(String, Option<String>)]) -> Result<()> {
        let _guard = self.meta_lock.lock().await;
        let mut meta = self.read_meta(key).await?;
        Self::apply_entries(&mut meta, entries);
        self.write_meta(key, &meta).await
    }

    async fn compare_and_set_metadata(
        &self,
        key: &str,
        name: &str,
        expected: Option<&str>,
        value: Option<&str>,
    ) -> Result<bool> {
        let _guard = self.meta_lock.lock().await;
        let mut meta = self.read_meta(key).await?;
        if meta.get(name).map(String::as_str) != expected {
            return Ok(false);
        }
        Self::apply_entries(&mut meta, &[(name.to_string(), value.map(str::to_string))]);
        self.write_meta(key, &meta).await?;
        Ok(true)
    }

    async fn create_multipart(&self, key: &str) -> Result<String> {
        Self::check_key(key)?;
        let upload_id = uuid::Uuid::new_v4().simple().to_string();
        let dir = self.upload_dir(&upload_id).await?;
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory: {}", dir.display()))?;
        fs::write(dir.join(UPLOAD_KEY_FILE), key.as_bytes()).await?;
        debug!("FileSystemObjectStore::create_multipart {} -> {}", key, upload_id);
        Ok(upload_id)
    }

    async fn upload_part(&self, key: &str, upload_id: &str, part_number: u32, data: Bytes) -> Result<String> {
        let dir = self.upload_dir(upload_id).await?;
        let owner = fs::read_to_string(dir.join(UPLOAD_KEY_FILE))
            .await
            .with_context(|| format!("No such multipart upload: {}", upload_id))?;
        if owner != key {
            bail!("multipart upload {} belongs to {}, not {}", upload_id, owner, key);
        }
        if part_number == 0 {
            bail!("part numbers start at 1");
        }
        if data.len() > self.config.max_part_size {
            bail!("part {} is {} bytes, above the maximum of {}", part_number, data.len(), self.config.max_part_size);
        }
        let part_id = crc32_hex(&data);
        fs::write(dir.join(format!("{:05}", part_number)), &data).await?;
        trace!("uploaded part {} of {} ({} bytes)", part_number, upload_id, data.len());
        Ok(part_id)
    }

    async fn complete_multipart(&self, key: &str, upload_id: &str, parts: &[CompletedPart]) -> Result<String> {
        let dir = self.upload_dir(upload_id).await?;
        let owner = fs::read_to_string(dir.join(UPLOAD_KEY_FILE))
            .await
            .with_context(|| format!("No such multipart upload: {}", upload_id))?;
        if owner != key {
            bail!("multipart upload {} belongs to {}, not {}", upload_id, owner, key);
        }
        if parts.is_empty() {
            bail!("multipart upload {} has no parts to complete", upload_id);
        }

        let mut assembled = Vec::new();
        for (idx, part) in parts.iter().enumerate() {
            let part_path = dir.join(format!("{:05}", part.part_number));
            let data = fs::read(&part_path)
                .await
                .with_context(|| format!("Part {} of {} was never uploaded", part.part_number, upload_id))?;
            if crc32_hex(&data) != part.part_id {
                bail!("part {} does not match id {}", part.part_number, part.part_id);
            }
            let is_last = idx + 1 == parts.len();
            if !is_last && data.len() < self.config.min_part_size {
                bail!(
                    "part {} is {} bytes, below the minimum of {} (only the last part may be smaller)",
                    part.part_number, data.len(), self.config.min_part_size
                );
            }
            assembled.extend_from_slice(&data);
        }

        let path = self.object_path(key).await?;
        self.write_atomic(&path, &assembled).await?;
        fs::remove_dir_all(&dir).await?;
        let e_tag = format!("{}-{}", crc32_hex(&assembled), parts.len());
        debug!("completed multipart {} for {} ({} bytes, {} parts)", upload_id, key, assembled.len(), parts.len());
        Ok(e_tag)
    }

    async fn abort_multipart(&self, _key: &str, upload_id: &str) -> Result<()> {
        let dir = self.upload_dir(upload_id).await?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to discard upload: {}", dir.display())),
        }
    }

    fn part_size_bounds(&self) -> PartSizeBounds {
        PartSizeBounds { min: self.config.min_part_size, max: self.config.max_part_size }
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let path = self.object_path(key).await?;
        let expires = (SystemTime::now() + expires_in)
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let signature = hex::encode(self.url_mac(key, expires)?.finalize().into_bytes());
        Ok(format!("file://{}?expires={}&signature={}", path.display(), expires, signature))
    }

    async fn create_container(&self) -> Result<()> {
        let dir = self.container_dir();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create container: {}", dir.display()))?;
        Ok(())
    }
}
