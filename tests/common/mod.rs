// tests/common/mod.rs
//
// Shared fixtures: a temp local root, a file-backed object store and a
// store wrapper that counts backend calls.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use storegate::{
    CompletedPart, FileSystemConfig, FileSystemObjectStore, GatewayConfig, ObjectStat, ObjectStore, PartSizeBounds,
    UnifiedFile,
};

pub const CONTAINER: &str = "media";

pub struct Fixture {
    pub tmp: TempDir,
    pub gw: UnifiedFile,
    pub calls: Arc<AtomicUsize>,
    pub fail_metadata_writes: Arc<AtomicBool>,
}

impl Fixture {
    pub fn site(&self) -> PathBuf {
        self.tmp.path().join("site")
    }

    pub fn container_dir(&self) -> PathBuf {
        self.tmp.path().join("store").join(CONTAINER)
    }

    pub fn backend_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every metadata write on the store fail until switched back.
    pub fn break_metadata_writes(&self, broken: bool) {
        self.fail_metadata_writes.store(broken, Ordering::SeqCst);
    }
}

pub fn fixture() -> Fixture {
    fixture_with_parts(FileSystemConfig::default())
}

/// Fixture whose store advertises `min`/`max` part sizes.
pub fn fixture_with_part_bounds(min: usize, max: usize) -> Fixture {
    fixture_with_parts(FileSystemConfig { min_part_size: min, max_part_size: max, ..Default::default() })
}

fn fixture_with_parts(fs_cfg: FileSystemConfig) -> Fixture {
    let tmp = TempDir::new().expect("temp dir");
    let site = tmp.path().join("site");
    std::fs::create_dir_all(&site).expect("site dir");
    std::fs::create_dir_all(tmp.path().join("store").join(CONTAINER)).expect("container dir");

    let inner = FileSystemObjectStore::with_config(tmp.path().join("store"), CONTAINER, fs_cfg);
    let calls = Arc::new(AtomicUsize::new(0));
    let fail_metadata_writes = Arc::new(AtomicBool::new(false));
    let store = Arc::new(CountingStore {
        inner,
        calls: Arc::clone(&calls),
        fail_metadata_writes: Arc::clone(&fail_metadata_writes),
    });

    let cfg = GatewayConfig::new(&site, CONTAINER)
        .with_temp_dir(tmp.path().join("tmp"))
        .with_local_prefix("App_Data/");
    Fixture { gw: UnifiedFile::new(cfg, store), tmp, calls, fail_metadata_writes }
}

/// Delegating store that counts every backend call and can be told to fail
/// metadata writes.
pub struct CountingStore {
    inner: FileSystemObjectStore,
    calls: Arc<AtomicUsize>,
    fail_metadata_writes: Arc<AtomicBool>,
}

impl CountingStore {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    fn container(&self) -> &str {
        self.inner.container()
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.hit();
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.hit();
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.hit();
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.hit();
        self.inner.delete(key).await
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()> {
        self.hit();
        self.inner.copy(src_key, dst_key).await
    }

    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        self.hit();
        self.inner.list(prefix, recursive).await
    }

    async fn stat(&self, key: &str) -> Result<Option<ObjectStat>> {
        self.hit();
        self.inner.stat(key).await
    }

    async fn get_metadata(&self, key: &str) -> Result<HashMap<String, String>> {
        self.hit();
        self.inner.get_metadata(key).await
    }

    async fn set_metadata(&self, key: &str, entries: &[(String, Option<String>)]) -> Result<()> {
        self.hit();
        if self.fail_metadata_writes.load(Ordering::SeqCst) {
            bail!("metadata service unavailable");
        }
        self.inner.set_metadata(key, entries).await
    }

    async fn compare_and_set_metadata(
        &self,
        key: &str,
        name: &str,
        expected: Option<&str>,
        value: Option<&str>,
    ) -> Result<bool> {
        self.hit();
        self.inner.compare_and_set_metadata(key, name, expected, value).await
    }

    async fn create_multipart(&self, key: &str) -> Result<String> {
        self.hit();
        self.inner.create_multipart(key).await
    }

    async fn upload_part(&self, key: &str, upload_id: &str, part_number: u32, data: Bytes) -> Result<String> {
        self.hit();
        self.inner.upload_part(key, upload_id, part_number, data).await
    }

    async fn complete_multipart(&self, key: &str, upload_id: &str, parts: &[CompletedPart]) -> Result<String> {
        self.hit();
        self.inner.complete_multipart(key, upload_id, parts).await
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<()> {
        self.hit();
        self.inner.abort_multipart(key, upload_id).await
    }

    fn part_size_bounds(&self) -> PartSizeBounds {
        self.inner.part_size_bounds()
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        self.hit();
        self.inner.signed_url(key, expires_in).await
    }

    async fn create_container(&self) -> Result<()> {
        self.hit();
        self.inner.create_container().await
    }
}
