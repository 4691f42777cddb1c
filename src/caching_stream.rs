// src/caching_stream.rs
//
// Seekable file stream over either a local file or a remote object.
//
// Remote objects are mirrored into a private temp file: downloaded on open
// when the mode needs existing content, uploaded in one put on close when
// anything was written. Exactly one of the two handles is live at a time.
//
// Lifecycle:
//   open_local / open_object
//     -> LocalBacked | ObjectBacked
//     -> (ObjectBacked only) MultipartActive after begin_multipart(),
//        back to ObjectBacked once upload_multipart() returns
//     -> close() or Drop
//
// Single owner; no internal locking. Two writers to one object race and the
// last one to close wins.

use bytes::Bytes;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::constants::TEMP_FILE_PREFIX;
use crate::directory::DirectoryPlaceholder;
use crate::error::{GatewayError, Result};
use crate::multipart::{MultipartCompleteInfo, MultipartUploadConfig, MultipartUploadCoordinator};
use crate::object_descriptor::ObjectDescriptor;

/// How an existing or missing target is treated on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Create; fail with `AlreadyExists` if present.
    CreateNew,
    /// Create or overwrite.
    Create,
    /// Must exist.
    Open,
    OpenOrCreate,
    /// Must exist; content discarded.
    Truncate,
    /// Open or create, positioned at the end.
    Append,
}

impl FileMode {
    /// Modes that only make sense for writing.
    pub fn is_write_only(self) -> bool {
        matches!(self, FileMode::CreateNew | FileMode::Create | FileMode::Truncate | FileMode::Append)
    }

    fn keeps_content(self) -> bool {
        matches!(self, FileMode::Open | FileMode::OpenOrCreate | FileMode::Append)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    Read,
    Write,
    ReadWrite,
}

impl FileAccess {
    pub fn can_read(self) -> bool {
        matches!(self, FileAccess::Read | FileAccess::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, FileAccess::Write | FileAccess::ReadWrite)
    }
}

pub(crate) fn check_mode(mode: FileMode, access: FileAccess, path: &str) -> Result<()> {
    if mode.is_write_only() && !access.can_write() {
        return Err(GatewayError::InvalidMode(format!("{:?} requires write access ({})", mode, path)));
    }
    Ok(())
}

struct ObjectBacking {
    temp: NamedTempFile,
    descriptor: ObjectDescriptor,
    existed: bool,
    dirty: bool,
    multipart_active: bool,
    // Writes always land at the end, like O_APPEND on local files.
    append: bool,
}

enum Backing {
    Local(File),
    Object(ObjectBacking),
}

pub struct CachingStream {
    path: String,
    access: FileAccess,
    backing: Option<Backing>,
    multipart: MultipartUploadConfig,
}

impl std::fmt::Debug for CachingStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.backing {
            None => "closed",
            Some(Backing::Local(_)) => "local",
            Some(Backing::Object(ob)) if ob.multipart_active => "multipart",
            Some(Backing::Object(_)) => "object",
        };
        f.debug_struct("CachingStream")
            .field("path", &self.path)
            .field("access", &self.access)
            .field("state", &state)
            .finish()
    }
}

fn closed() -> io::Error {
    io::Error::other("stream is closed")
}

impl CachingStream {
    /// Open a file on local disk.
    pub fn open_local(path: &Path, shown: &str, mode: FileMode, access: FileAccess) -> Result<Self> {
        check_mode(mode, access, shown)?;

        if !matches!(mode, FileMode::Open | FileMode::Truncate) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| GatewayError::from_io(e, shown))?;
            }
        }

        let mut opts = OpenOptions::new();
        opts.read(access.can_read()).write(access.can_write());
        match mode {
            FileMode::CreateNew => {
                opts.create_new(true);
            }
            FileMode::Create => {
                opts.create(true).truncate(true);
            }
            FileMode::Open => {}
            FileMode::OpenOrCreate => {
                if access.can_write() {
                    opts.create(true);
                } else if !path.exists() {
                    // OpenOptions refuses create without write access.
                    File::create(path).map_err(|e| GatewayError::from_io(e, shown))?;
                }
            }
            FileMode::Truncate => {
                opts.truncate(true);
            }
            FileMode::Append => {
                opts.append(true).create(true);
            }
        }
        let file = opts.open(path).map_err(|e| GatewayError::from_io(e, shown))?;
        trace!("opened local stream {} ({:?}, {:?})", shown, mode, access);
        Ok(Self {
            path: shown.to_string(),
            access,
            backing: Some(Backing::Local(file)),
            multipart: MultipartUploadConfig::default(),
        })
    }

    /// Open a remote object through a temp file in `temp_dir`.
    pub fn open_object(
        descriptor: ObjectDescriptor,
        shown: &str,
        mode: FileMode,
        access: FileAccess,
        temp_dir: &Path,
        multipart: MultipartUploadConfig,
    ) -> Result<Self> {
        check_mode(mode, access, shown)?;

        let existed = descriptor.exists()?;
        match mode {
            FileMode::CreateNew if existed => return Err(GatewayError::AlreadyExists(shown.to_string())),
            FileMode::Open | FileMode::Truncate if !existed => {
                return Err(GatewayError::FileNotFound(shown.to_string()));
            }
            _ => {}
        }

        fs::create_dir_all(temp_dir)?;
        let mut temp = tempfile::Builder::new().prefix(TEMP_FILE_PREFIX).tempfile_in(temp_dir)?;

        if existed && mode.keeps_content() {
            match descriptor.get_content()? {
                Some(content) => {
                    temp.as_file_mut().write_all(&content)?;
                    let pos = if mode == FileMode::Append { SeekFrom::End(0) } else { SeekFrom::Start(0) };
                    temp.as_file_mut().seek(pos)?;
                    debug!("cached {} bytes of {} in {}", content.len(), descriptor.key(), temp.path().display());
                }
                // Deleted between the existence check and the download.
                None if mode == FileMode::Open => return Err(GatewayError::FileNotFound(shown.to_string())),
                None => {}
            }
        }

        // A new or truncated object has to be written back even if the
        // caller never writes a byte.
        let dirty = access.can_write() && (!existed || !mode.keeps_content());

        Ok(Self {
            path: shown.to_string(),
            access,
            backing: Some(Backing::Object(ObjectBacking {
                temp,
                descriptor,
                existed,
                dirty,
                multipart_active: false,
                append: mode == FileMode::Append,
            })),
            multipart,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn access(&self) -> FileAccess {
        self.access
    }

    pub fn is_local(&self) -> bool {
        matches!(self.backing, Some(Backing::Local(_)))
    }

    pub fn is_closed(&self) -> bool {
        self.backing.is_none()
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        match self.backing.as_mut() {
            Some(Backing::Local(f)) => Ok(f),
            Some(Backing::Object(ob)) => Ok(ob.temp.as_file_mut()),
            None => Err(closed()),
        }
    }

    fn mark_dirty(&mut self) {
        if let Some(Backing::Object(ob)) = self.backing.as_mut() {
            ob.dirty = true;
        }
    }

    fn require_write(&self) -> io::Result<()> {
        if self.access.can_write() {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, format!("{} was opened read-only", self.path)))
        }
    }

    fn require_no_multipart(&self) -> io::Result<()> {
        match self.backing.as_ref() {
            Some(Backing::Object(ob)) if ob.multipart_active => Err(io::Error::new(
                io::ErrorKind::ResourceBusy,
                format!("{} has a multipart session in progress", self.path),
            )),
            _ => Ok(()),
        }
    }

    /// Current length of the content.
    pub fn len(&self) -> io::Result<u64> {
        match self.backing.as_ref() {
            Some(Backing::Local(f)) => Ok(f.metadata()?.len()),
            Some(Backing::Object(ob)) => Ok(ob.temp.as_file().metadata()?.len()),
            None => Err(closed()),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn set_len(&mut self, size: u64) -> io::Result<()> {
        self.require_write()?;
        self.require_no_multipart()?;
        self.file_mut()?.set_len(size)?;
        self.mark_dirty();
        Ok(())
    }

    /// Start a multipart session on the backing object. Until the stream is
    /// closed, writes are refused and close() no longer uploads the temp
    /// content; the caller commits via the returned coordinator.
    pub fn begin_multipart(&mut self) -> Result<MultipartUploadCoordinator> {
        if !self.access.can_write() {
            return Err(GatewayError::InvalidMode(format!("{} was opened read-only", self.path)));
        }
        match self.backing.as_mut() {
            Some(Backing::Object(ob)) => {
                ob.multipart_active = true;
                Ok(MultipartUploadCoordinator::new(ob.descriptor.clone(), self.multipart.clone()))
            }
            Some(Backing::Local(_)) => {
                Err(GatewayError::InvalidMode(format!("{} is a local file; multipart needs an object", self.path)))
            }
            None => Err(GatewayError::Io(closed())),
        }
    }

    /// Push the whole temp content as a multipart upload in bounded parts.
    pub fn upload_multipart(&mut self) -> Result<MultipartCompleteInfo> {
        let mut coordinator = self.begin_multipart()?;
        let Some(Backing::Object(ob)) = self.backing.as_mut() else {
            return Err(GatewayError::Io(closed()));
        };
        let file = ob.temp.as_file_mut();
        let pos = file.stream_position()?;
        file.seek(SeekFrom::Start(0))?;
        let uploaded = coordinator.upload_from_reader(file);
        // Later writes go back through the normal upload on close.
        ob.multipart_active = false;
        let info = uploaded?;
        file.seek(SeekFrom::Start(pos))?;
        ob.dirty = false;
        ob.existed = true;
        Ok(info)
    }

    /// Release the handle, uploading written content for object streams.
    ///
    /// Upload failures are returned after the temp file is gone; the remote
    /// object is left as it was. Metadata stamping failures are only logged.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let Some(backing) = self.backing.take() else {
            return Ok(());
        };
        match backing {
            Backing::Local(mut f) => {
                if self.access.can_write() {
                    f.flush()?;
                }
                Ok(())
            }
            Backing::Object(ob) => self.finish_object(ob),
        }
    }

    fn finish_object(&self, ob: ObjectBacking) -> Result<()> {
        let ObjectBacking { mut temp, mut descriptor, existed, dirty, multipart_active, .. } = ob;
        if !self.access.can_write() {
            return Ok(());
        }

        if multipart_active {
            debug!("closing {} with multipart active; skipping upload", self.path);
        } else if dirty {
            let file = temp.as_file_mut();
            file.seek(SeekFrom::Start(0))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            drop(temp);
            debug!("uploading {} bytes to {}", buf.len(), descriptor.key());
            descriptor.put_content(Bytes::from(buf))?;
        } else {
            trace!("{} unchanged; nothing to upload", self.path);
            return Ok(());
        }

        let now = Utc::now();
        descriptor.refresh();
        if let Err(e) = descriptor.stamp_write(now) {
            warn!("failed to stamp timestamps on {}: {}", descriptor.key(), e);
        }
        if !existed {
            let mut parent = DirectoryPlaceholder::for_parent_of(&descriptor);
            if let Err(e) = parent.touch(now) {
                warn!("failed to touch directory placeholder {}: {}", parent.key(), e);
            }
        }
        Ok(())
    }
}

impl Drop for CachingStream {
    fn drop(&mut self) {
        if self.backing.is_none() {
            return;
        }
        if let Err(e) = self.finish() {
            warn!("closing {} on drop failed: {}", self.path, e);
        }
    }
}

impl Read for CachingStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.access.can_read() {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, format!("{} was opened write-only", self.path)));
        }
        self.file_mut()?.read(buf)
    }
}

impl Write for CachingStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.require_write()?;
        self.require_no_multipart()?;
        let file = match self.backing.as_mut() {
            Some(Backing::Local(f)) => f,
            Some(Backing::Object(ob)) => {
                if ob.append {
                    ob.temp.as_file_mut().seek(SeekFrom::End(0))?;
                }
                ob.temp.as_file_mut()
            }
            None => return Err(closed()),
        };
        let n = file.write(buf)?;
        if n > 0 {
            self.mark_dirty();
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl Seek for CachingStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file_mut()?.seek(pos)
    }
}
