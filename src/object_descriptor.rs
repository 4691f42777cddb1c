// src/object_descriptor.rs
//
// In-memory handle to one remote object.
//
// The store has no notion of timestamps, attributes or locks, so all of them
// live in the object's string metadata. Metadata is loaded lazily on first
// access; writes are either persisted immediately or queued and flushed in a
// single store call.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::attributes::FileAttributes;
use crate::constants::{META_ATTRIBUTES, META_CREATION_TIME, META_LAST_WRITE_TIME, META_LOCK_OWNER};
use crate::error::{GatewayError, Result};
use crate::object_store::{CompletedPart, ObjectStat, ObjectStore, PartSizeBounds};
use crate::runtime::run_on_global_rt;

pub(crate) fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn decode_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim()).ok().map(|d| d.with_timezone(&Utc))
}

#[derive(Clone)]
pub struct ObjectDescriptor {
    store: Arc<dyn ObjectStore>,
    key: String,
    metadata: Option<HashMap<String, String>>,
    pending: Vec<(String, Option<String>)>,
}

impl fmt::Debug for ObjectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDescriptor")
            .field("container", &self.store.container())
            .field("key", &self.key)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ObjectDescriptor {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into(), metadata: None, pending: Vec::new() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Another descriptor on the same store.
    pub fn sibling(&self, key: impl Into<String>) -> ObjectDescriptor {
        ObjectDescriptor::new(Arc::clone(&self.store), key)
    }

    /// Drive one store call to completion on the global runtime.
    fn call<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn ObjectStore>, String) -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let fut = f(Arc::clone(&self.store), self.key.clone());
        Ok(run_on_global_rt(fut)?)
    }

    pub fn exists(&self) -> Result<bool> {
        self.call(|store, key| async move { store.exists(&key).await })
    }

    /// Full content, or `None` when the object does not exist.
    pub fn get_content(&self) -> Result<Option<Bytes>> {
        self.call(|store, key| async move { store.get(&key).await })
    }

    pub fn put_content(&self, data: Bytes) -> Result<()> {
        trace!("put_content {} ({} bytes)", self.key, data.len());
        self.call(move |store, key| async move { store.put(&key, data).await })
    }

    /// Delete the object and its metadata. Missing objects are fine.
    pub fn delete(&mut self) -> Result<()> {
        self.call(|store, key| async move { store.delete(&key).await })?;
        self.metadata = None;
        self.pending.clear();
        Ok(())
    }

    /// Backend-native copy; returns a descriptor for the destination.
    pub fn copy_to(&self, dest_key: &str) -> Result<ObjectDescriptor> {
        let dest = dest_key.to_string();
        self.call(move |store, key| async move { store.copy(&key, &dest).await })?;
        Ok(self.sibling(dest_key))
    }

    pub fn stat(&self) -> Result<Option<ObjectStat>> {
        self.call(|store, key| async move { store.stat(&key).await })
    }

    /// Keys under `prefix` on this descriptor's store.
    pub fn list_prefix(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        let prefix = prefix.to_string();
        self.call(move |store, _| async move { store.list(&prefix, recursive).await })
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    fn loaded(&mut self) -> Result<&mut HashMap<String, String>> {
        if self.metadata.is_none() {
            let mut meta = self.call(|store, key| async move { store.get_metadata(&key).await })?;
            for (name, value) in &self.pending {
                match value {
                    Some(v) => {
                        meta.insert(name.clone(), v.clone());
                    }
                    None => {
                        meta.remove(name);
                    }
                }
            }
            self.metadata = Some(meta);
        }
        Ok(self.metadata.get_or_insert_with(HashMap::new))
    }

    /// Drop cached metadata; the next read goes back to the store.
    /// Queued writes survive and are re-applied on top.
    pub fn refresh(&mut self) {
        self.metadata = None;
    }

    pub fn get_metadata(&mut self, name: &str) -> Result<Option<String>> {
        Ok(self.loaded()?.get(name).cloned())
    }

    /// Set one metadata entry. With `persist_now == false` the write is queued
    /// until `flush()`, so several updates cost one round-trip.
    pub fn set_metadata(&mut self, name: &str, value: impl Into<String>, persist_now: bool) -> Result<()> {
        self.write_entry(name, Some(value.into()), persist_now)
    }

    pub fn remove_metadata(&mut self, name: &str, persist_now: bool) -> Result<()> {
        self.write_entry(name, None, persist_now)
    }

    fn write_entry(&mut self, name: &str, value: Option<String>, persist_now: bool) -> Result<()> {
        if let Some(meta) = self.metadata.as_mut() {
            match &value {
                Some(v) => {
                    meta.insert(name.to_string(), v.clone());
                }
                None => {
                    meta.remove(name);
                }
            }
        }
        self.pending.push((name.to_string(), value));
        if persist_now { self.flush() } else { Ok(()) }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Persist queued metadata writes in one store call.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let entries = std::mem::take(&mut self.pending);
        debug!("flushing {} metadata entries for {}", entries.len(), self.key);
        let to_send = entries.clone();
        let result = self.call(move |store, key| async move { store.set_metadata(&key, &to_send).await });
        if result.is_err() {
            // Keep them queued so a retry can flush again.
            self.pending = entries;
        }
        result
    }

    pub fn creation_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.get_metadata(META_CREATION_TIME)?.as_deref().and_then(decode_time))
    }

    pub fn last_write_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.get_metadata(META_LAST_WRITE_TIME)?.as_deref().and_then(decode_time))
    }

    pub fn attributes(&mut self) -> Result<FileAttributes> {
        Ok(self
            .get_metadata(META_ATTRIBUTES)?
            .as_deref()
            .and_then(FileAttributes::parse)
            .unwrap_or_default())
    }

    pub fn set_creation_time(&mut self, t: DateTime<Utc>, persist_now: bool) -> Result<()> {
        self.set_metadata(META_CREATION_TIME, encode_time(t), persist_now)
    }

    pub fn set_last_write_time(&mut self, t: DateTime<Utc>, persist_now: bool) -> Result<()> {
        self.set_metadata(META_LAST_WRITE_TIME, encode_time(t), persist_now)
    }

    pub fn set_attributes(&mut self, attrs: FileAttributes, persist_now: bool) -> Result<()> {
        self.set_metadata(META_ATTRIBUTES, attrs.encode(), persist_now)
    }

    /// Record a content write at `now`: last-write always, creation only when
    /// unset. One store round-trip.
    pub fn stamp_write(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.creation_time()?.is_none() {
            self.set_creation_time(now, false)?;
        }
        self.set_last_write_time(now, false)?;
        self.flush()
    }

    // ------------------------------------------------------------------
    // Advisory lock
    // ------------------------------------------------------------------

    /// Current lock owner, read straight from the store.
    pub fn lock_owner(&mut self) -> Result<Option<String>> {
        self.refresh();
        Ok(self.get_metadata(META_LOCK_OWNER)?.filter(|s| !s.is_empty()))
    }

    pub fn is_locked(&mut self) -> Result<bool> {
        Ok(self.lock_owner()?.is_some())
    }

    /// Take the lock for `session`. Re-entrant for the same session; fails
    /// with `ObjectLocked` if another session holds it.
    ///
    /// Uses the store's conditional metadata write, so it is only as atomic
    /// as the backend's `compare_and_set_metadata`.
    pub fn lock(&mut self, session: &str) -> Result<()> {
        let owner = session.to_string();
        let acquired = self.call(move |store, key| async move {
            store.compare_and_set_metadata(&key, META_LOCK_OWNER, None, Some(&owner)).await
        })?;
        if acquired {
            self.refresh();
            trace!("locked {} for session {}", self.key, session);
            return Ok(());
        }
        match self.lock_owner()? {
            Some(current) if current == session => Ok(()),
            Some(current) => Err(GatewayError::ObjectLocked { key: self.key.clone(), owner: current }),
            // Released between our attempt and the read; try once more.
            None => {
                let owner = session.to_string();
                let acquired = self.call(move |store, key| async move {
                    store.compare_and_set_metadata(&key, META_LOCK_OWNER, None, Some(&owner)).await
                })?;
                self.refresh();
                if acquired {
                    Ok(())
                } else {
                    let current = self.lock_owner()?.unwrap_or_default();
                    Err(GatewayError::ObjectLocked { key: self.key.clone(), owner: current })
                }
            }
        }
    }

    /// Release the lock if `session` holds it. Returns whether it was released.
    pub fn unlock(&mut self, session: &str) -> Result<bool> {
        let owner = session.to_string();
        let released = self.call(move |store, key| async move {
            store.compare_and_set_metadata(&key, META_LOCK_OWNER, Some(&owner), None).await
        })?;
        self.refresh();
        Ok(released)
    }

    // ------------------------------------------------------------------
    // Multipart pass-through
    // ------------------------------------------------------------------

    pub fn part_size_bounds(&self) -> PartSizeBounds {
        self.store.part_size_bounds()
    }

    pub fn create_multipart(&self) -> Result<String> {
        self.call(|store, key| async move { store.create_multipart(&key).await })
    }

    pub fn upload_part(&self, upload_id: &str, part_number: u32, data: Bytes) -> Result<String> {
        let upload_id = upload_id.to_string();
        self.call(move |store, key| async move { store.upload_part(&key, &upload_id, part_number, data).await })
    }

    pub fn complete_multipart(&self, upload_id: &str, parts: Vec<CompletedPart>) -> Result<String> {
        let upload_id = upload_id.to_string();
        self.call(move |store, key| async move { store.complete_multipart(&key, &upload_id, &parts).await })
    }

    pub fn abort_multipart(&self, upload_id: &str) -> Result<()> {
        let upload_id = upload_id.to_string();
        self.call(move |store, key| async move { store.abort_multipart(&key, &upload_id).await })
    }

    pub fn signed_url(&self, expires_in: Duration) -> Result<String> {
        self.call(move |store, key| async move { store.signed_url(&key, expires_in).await })
    }

    pub fn container(&self) -> &str {
        self.store.container()
    }
}
