// src/multipart.rs
//
// Multipart upload (MPU) coordination for large objects.
//
// Design:
// - MultipartUploadConfig carries the part-size bounds (store-advertised by
//   default) and the abort-on-drop policy.
// - MultipartUploadCoordinator runs sessions against one ObjectDescriptor:
//     - init_session() starts a backend upload, lock untouched
//     - upload_part() reads up to max_part_size bytes and uploads them
//     - complete_session() commits the given parts in order
//     - abort_session() drops bookkeeping and discards parts best effort
// - Every backend call that mutates the session runs under the object's
//   advisory lock, held only for that call. A crashed uploader therefore
//   never wedges the object.
//
// Notes:
// - Parts are uploaded in the order the caller supplies them; nothing here
//   reorders or retries.
// - Non-final parts below min_part_size are rejected by the backend at
//   commit time, not pre-validated.

use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::constants::MAX_MULTIPART_PARTS;
use crate::directory::DirectoryPlaceholder;
use crate::error::{GatewayError, Result};
use crate::object_descriptor::ObjectDescriptor;
use crate::object_store::{CompletedPart, PartSizeBounds};

#[derive(Clone, Debug)]
pub struct MultipartUploadConfig {
    /// Smallest legal non-final part.
    pub min_part_size: usize,
    /// Upper bound on bytes read per `upload_part`.
    pub max_part_size: usize,
    /// Abort unfinished sessions automatically when the coordinator is dropped.
    pub abort_on_drop: bool,
}

impl Default for MultipartUploadConfig {
    fn default() -> Self {
        Self::from_bounds(PartSizeBounds::default())
    }
}

impl MultipartUploadConfig {
    pub fn from_bounds(bounds: PartSizeBounds) -> Self {
        Self { min_part_size: bounds.min, max_part_size: bounds.max, abort_on_drop: true }
    }
}

/// Opaque multipart session id (the backend upload id).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result info returned by `upload_from_reader()`
#[derive(Clone, Debug)]
pub struct MultipartCompleteInfo {
    pub session_id: SessionId,
    pub e_tag: String,
    pub total_bytes: u64,
    pub parts: usize,
    pub started_at: SystemTime,
    pub completed_at: SystemTime,
}

#[derive(Debug)]
struct SessionState {
    parts: Vec<CompletedPart>,
    last_part_number: u32,
    total_bytes: u64,
    started_at: SystemTime,
}

/// Holds the object's advisory lock for one backend call.
struct LockGuard {
    descriptor: ObjectDescriptor,
    session: String,
    held: bool,
}

impl LockGuard {
    fn acquire(descriptor: &ObjectDescriptor, session: &SessionId) -> Result<Self> {
        let mut descriptor = descriptor.clone();
        descriptor.lock(session.as_str())?;
        Ok(Self { descriptor, session: session.as_str().to_string(), held: true })
    }

    fn release(mut self) -> Result<()> {
        self.held = false;
        self.descriptor.unlock(&self.session).map(|_| ())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        if let Err(e) = self.descriptor.unlock(&self.session) {
            warn!("failed to release lock on {} for session {}: {}", self.descriptor.key(), self.session, e);
        }
    }
}

pub struct MultipartUploadCoordinator {
    descriptor: ObjectDescriptor,
    cfg: MultipartUploadConfig,
    sessions: HashMap<SessionId, SessionState>,
}

impl Drop for MultipartUploadCoordinator {
    fn drop(&mut self) {
        if !self.cfg.abort_on_drop || self.sessions.is_empty() {
            return;
        }
        let ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
        for id in ids {
            debug!("aborting unfinished multipart session {} on drop", id);
            let _ = self.abort_session(&id);
        }
    }
}

impl MultipartUploadCoordinator {
    pub fn new(descriptor: ObjectDescriptor, cfg: MultipartUploadConfig) -> Self {
        Self { descriptor, cfg, sessions: HashMap::new() }
    }

    /// Coordinator using the bounds the store advertises.
    pub fn with_store_bounds(descriptor: ObjectDescriptor) -> Self {
        let cfg = MultipartUploadConfig::from_bounds(descriptor.part_size_bounds());
        Self::new(descriptor, cfg)
    }

    pub fn key(&self) -> &str {
        self.descriptor.key()
    }

    pub fn config(&self) -> &MultipartUploadConfig {
        &self.cfg
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Start a session. Does not touch the lock.
    pub fn init_session(&mut self) -> Result<SessionId> {
        let id = SessionId(self.descriptor.create_multipart()?);
        debug!("multipart session {} started for {}", id, self.descriptor.key());
        self.sessions.insert(
            id.clone(),
            SessionState { parts: Vec::new(), last_part_number: 0, total_bytes: 0, started_at: SystemTime::now() },
        );
        Ok(id)
    }

    fn state(&self, session: &SessionId) -> Result<&SessionState> {
        self.sessions
            .get(session)
            .ok_or_else(|| GatewayError::InvalidMode(format!("unknown multipart session {}", session)))
    }

    /// Read up to `max_part_size` bytes from `reader` and upload them as
    /// part `part_number`.
    pub fn upload_part<R: Read>(
        &mut self,
        session: &SessionId,
        reader: &mut R,
        part_number: u32,
    ) -> Result<CompletedPart> {
        self.check_part_number(session, part_number)?;
        let mut buf = Vec::new();
        reader.by_ref().take(self.cfg.max_part_size as u64).read_to_end(&mut buf)?;
        self.upload_bytes(session, part_number, Bytes::from(buf))
    }

    fn check_part_number(&self, session: &SessionId, part_number: u32) -> Result<()> {
        let state = self.state(session)?;
        if part_number == 0 || part_number as usize > MAX_MULTIPART_PARTS {
            return Err(GatewayError::InvalidMode(format!(
                "part number {} outside 1..={}",
                part_number, MAX_MULTIPART_PARTS
            )));
        }
        if part_number <= state.last_part_number {
            return Err(GatewayError::InvalidMode(format!(
                "part {} supplied after part {}; parts must be uploaded in increasing order",
                part_number, state.last_part_number
            )));
        }
        Ok(())
    }

    fn upload_bytes(&mut self, session: &SessionId, part_number: u32, data: Bytes) -> Result<CompletedPart> {
        self.check_part_number(session, part_number)?;
        let len = data.len() as u64;

        let guard = LockGuard::acquire(&self.descriptor, session)?;
        let uploaded = self.descriptor.upload_part(session.as_str(), part_number, data);
        guard.release()?;
        let part_id = uploaded?;

        let part = CompletedPart { part_number, part_id };
        if let Some(state) = self.sessions.get_mut(session) {
            state.parts.push(part.clone());
            state.last_part_number = part_number;
            state.total_bytes += len;
        }
        debug!("uploaded part {} ({} bytes) of {} for {}", part_number, len, session, self.descriptor.key());
        Ok(part)
    }

    /// Commit `parts` (in the order given) and return the resulting ETag.
    pub fn complete_session(&mut self, session: &SessionId, parts: &[CompletedPart]) -> Result<String> {
        self.state(session)?;

        let guard = LockGuard::acquire(&self.descriptor, session)?;
        let completed = self.descriptor.complete_multipart(session.as_str(), parts.to_vec());
        guard.release()?;
        let e_tag = completed?;

        self.sessions.remove(session);
        self.stamp_completed();
        info!("multipart session {} committed {} parts to {}", session, parts.len(), self.descriptor.key());
        Ok(e_tag)
    }

    // Content is already committed; metadata failures only get logged.
    fn stamp_completed(&mut self) {
        let now = Utc::now();
        self.descriptor.refresh();
        if let Err(e) = self.descriptor.stamp_write(now) {
            warn!("failed to stamp timestamps on {}: {}", self.descriptor.key(), e);
        }
        let mut parent = DirectoryPlaceholder::for_parent_of(&self.descriptor);
        if let Err(e) = parent.touch(now) {
            warn!("failed to touch directory placeholder {}: {}", parent.key(), e);
        }
    }

    /// Forget `session`, release its lock if held and ask the backend to
    /// discard uploaded parts. Best effort; unknown sessions are a no-op.
    pub fn abort_session(&mut self, session: &SessionId) -> Result<()> {
        if self.sessions.remove(session).is_none() {
            return Ok(());
        }
        match self.descriptor.unlock(session.as_str()) {
            Ok(true) => debug!("released lock held by aborted session {}", session),
            Ok(false) => {}
            Err(e) => warn!("failed to release lock for aborted session {}: {}", session, e),
        }
        if let Err(e) = self.descriptor.abort_multipart(session.as_str()) {
            warn!("backend abort of multipart session {} failed: {}", session, e);
        }
        Ok(())
    }

    /// Upload everything `reader` yields in `max_part_size` parts and commit.
    /// The session is aborted if any step fails.
    pub fn upload_from_reader<R: Read>(&mut self, reader: &mut R) -> Result<MultipartCompleteInfo> {
        let session = self.init_session()?;
        match self.upload_all(&session, reader) {
            Ok(info) => Ok(info),
            Err(e) => {
                let _ = self.abort_session(&session);
                Err(e)
            }
        }
    }

    fn upload_all<R: Read>(&mut self, session: &SessionId, reader: &mut R) -> Result<MultipartCompleteInfo> {
        let mut part_number = 1u32;
        loop {
            let mut buf = Vec::new();
            reader.by_ref().take(self.cfg.max_part_size as u64).read_to_end(&mut buf)?;
            // An empty first part still yields an (empty) object.
            if buf.is_empty() && part_number > 1 {
                break;
            }
            let short = buf.len() < self.cfg.max_part_size;
            self.upload_bytes(session, part_number, Bytes::from(buf))?;
            if short {
                break;
            }
            part_number += 1;
        }

        let (parts, total_bytes, started_at) = {
            let state = self.state(session)?;
            (state.parts.clone(), state.total_bytes, state.started_at)
        };
        let e_tag = self.complete_session(session, &parts)?;
        Ok(MultipartCompleteInfo {
            session_id: session.clone(),
            e_tag,
            total_bytes,
            parts: parts.len(),
            started_at,
            completed_at: SystemTime::now(),
        })
    }
}
