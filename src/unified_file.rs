// src/unified_file.rs
//
// File operations over the hybrid namespace.
//
// Each call resolves its path(s) once into a `StorageTarget` and routes on
// that: local targets go to std::fs, remote targets go through an
// `ObjectDescriptor`. Nothing is cached between calls.
//
// Validation order for every mutating call:
//   empty -> invalid characters -> too long -> existence

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::attributes::FileAttributes;
use crate::caching_stream::{CachingStream, FileAccess, FileMode};
use crate::config::GatewayConfig;
use crate::constants::{DEFAULT_STREAM_BUFFER_SIZE, META_ATTRIBUTES, META_LOCK_OWNER, VIRTUAL_ROOT_PREFIX};
use crate::directory::DirectoryPlaceholder;
use crate::error::{GatewayError, Result};
use crate::metadata_snapshot::FileMetadataSnapshot;
use crate::multipart::{MultipartCompleteInfo, MultipartUploadConfig, MultipartUploadCoordinator};
use crate::object_descriptor::{decode_time, ObjectDescriptor};
use crate::object_store::ObjectStore;
use crate::path_classifier::{NormalizedPath, PathClassifier, ResolvedPath, StorageTarget};

#[derive(Clone)]
pub struct UnifiedFile {
    config: Arc<GatewayConfig>,
    classifier: PathClassifier,
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for UnifiedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedFile")
            .field("local_root", &self.config.local_root)
            .field("container", &self.store.container())
            .finish()
    }
}

fn create_parent(path: &Path, display: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GatewayError::from_io(e, display))?;
    }
    Ok(())
}

impl UnifiedFile {
    pub fn new(config: GatewayConfig, store: Arc<dyn ObjectStore>) -> Self {
        let classifier = PathClassifier::new(&config);
        Self { config: Arc::new(config), classifier, store }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    pub fn resolve(&self, path: &str) -> Result<ResolvedPath> {
        self.classifier.resolve(path)
    }

    fn descriptor(&self, key: &str) -> ObjectDescriptor {
        ObjectDescriptor::new(Arc::clone(&self.store), key)
    }

    /// Part-size bounds: store-advertised, overridden by configuration.
    pub fn multipart_config(&self) -> MultipartUploadConfig {
        let mut cfg = MultipartUploadConfig::from_bounds(self.store.part_size_bounds());
        if let Some(min) = self.config.min_part_size {
            cfg.min_part_size = min;
        }
        if let Some(max) = self.config.max_part_size {
            cfg.max_part_size = max;
        }
        cfg
    }

    fn target_exists(&self, target: &StorageTarget) -> Result<bool> {
        match target {
            StorageTarget::Local(local) => Ok(local.path.is_file()),
            StorageTarget::Remote(remote) => self.descriptor(&remote.key).exists(),
        }
    }

    /// True if `path` names an existing file. Never fails: invalid paths,
    /// directory placeholders and store errors all read as `false`.
    pub fn exists(&self, path: &str) -> bool {
        if PathClassifier::is_directory_placeholder(path) {
            return false;
        }
        let resolved = match self.resolve(path) {
            Ok(r) => r,
            Err(e) => {
                debug!("exists({}): {}", path, e);
                return false;
            }
        };
        self.target_exists(&resolved.target).unwrap_or_else(|e| {
            debug!("exists({}): {}", path, e);
            false
        })
    }

    // ------------------------------------------------------------------
    // Delete / copy / move
    // ------------------------------------------------------------------

    /// Delete `path`. A missing target is not an error.
    pub fn delete(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        self.delete_resolved(&resolved)
    }

    fn delete_resolved(&self, resolved: &ResolvedPath) -> Result<()> {
        match &resolved.target {
            StorageTarget::Local(local) => match fs::remove_file(&local.path) {
                Ok(()) => {
                    info!("deleted {}", resolved.display());
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(GatewayError::from_io(e, &resolved.display())),
            },
            StorageTarget::Remote(remote) => {
                let mut descriptor = self.descriptor(&remote.key);
                if !descriptor.exists()? {
                    return Ok(());
                }
                descriptor.delete()?;
                info!("deleted {}", resolved.display());
                self.touch_parent(&descriptor);
                Ok(())
            }
        }
    }

    /// Copy `src` to `dest`, replacing `dest` only when `overwrite` is set.
    pub fn copy(&self, src: &str, dest: &str, overwrite: bool) -> Result<()> {
        let src = self.resolve(src)?;
        let dest = self.resolve(dest)?;
        if !self.target_exists(&src.target)? {
            return Err(GatewayError::FileNotFound(src.display()));
        }
        // Copying a file over itself would truncate it.
        if overwrite && PathClassifier::same_location(&src.normalized, &dest.normalized) {
            return Err(GatewayError::SameLocation(src.display()));
        }
        if !overwrite && self.target_exists(&dest.target)? {
            return Err(GatewayError::AlreadyExists(dest.display()));
        }
        self.copy_resolved(&src, &dest)
    }

    fn copy_resolved(&self, src: &ResolvedPath, dest: &ResolvedPath) -> Result<()> {
        match (&src.target, &dest.target) {
            (StorageTarget::Local(from), StorageTarget::Local(to)) => {
                create_parent(&to.path, &dest.display())?;
                fs::copy(&from.path, &to.path).map_err(|e| GatewayError::from_io(e, &src.display()))?;
            }
            (StorageTarget::Remote(from), StorageTarget::Remote(to)) => {
                let mut source = self.descriptor(&from.key);
                let attrs = source.attributes()?;
                let copied = source.copy_to(&to.key)?;
                self.stamp_copied(copied, attrs);
            }
            (StorageTarget::Local(from), StorageTarget::Remote(to)) => {
                let meta = fs::metadata(&from.path).map_err(|e| GatewayError::from_io(e, &src.display()))?;
                let attrs = FileAttributes::from_local(&meta, from.path.file_name().and_then(|n| n.to_str()));
                let data = fs::read(&from.path).map_err(|e| GatewayError::from_io(e, &src.display()))?;
                let descriptor = self.descriptor(&to.key);
                descriptor.put_content(Bytes::from(data))?;
                self.stamp_copied(descriptor, attrs);
            }
            (StorageTarget::Remote(from), StorageTarget::Local(to)) => {
                let mut stream = CachingStream::open_object(
                    self.descriptor(&from.key),
                    &src.display(),
                    FileMode::Open,
                    FileAccess::Read,
                    &self.config.temp_dir(),
                    self.multipart_config(),
                )?;
                create_parent(&to.path, &dest.display())?;
                let file = File::create(&to.path).map_err(|e| GatewayError::from_io(e, &dest.display()))?;
                let mut writer = BufWriter::with_capacity(DEFAULT_STREAM_BUFFER_SIZE, file);
                io::copy(&mut stream, &mut writer)?;
                writer.flush()?;
                stream.close()?;
            }
        }
        info!("copied {} -> {}", src.display(), dest.display());
        Ok(())
    }

    // A copied object is a new file as far as timestamps go. Attributes
    // follow the source; whatever the old destination carried is dropped.
    fn stamp_copied(&self, mut descriptor: ObjectDescriptor, attrs: FileAttributes) {
        let now = Utc::now();
        descriptor.refresh();
        let attrs = attrs.difference(FileAttributes::NORMAL);
        let stamped = descriptor
            .set_creation_time(now, false)
            .and_then(|_| descriptor.set_last_write_time(now, false))
            .and_then(|_| {
                if attrs.is_empty() {
                    descriptor.remove_metadata(META_ATTRIBUTES, false)
                } else {
                    descriptor.set_attributes(attrs, false)
                }
            })
            .and_then(|_| descriptor.remove_metadata(META_LOCK_OWNER, false))
            .and_then(|_| descriptor.flush());
        if let Err(e) = stamped {
            warn!("failed to stamp timestamps on {}: {}", descriptor.key(), e);
        }
        self.touch_parent(&descriptor);
    }

    fn touch_parent(&self, child: &ObjectDescriptor) {
        let mut parent = DirectoryPlaceholder::for_parent_of(child);
        if let Err(e) = parent.touch(Utc::now()) {
            warn!("failed to touch directory placeholder {}: {}", parent.key(), e);
        }
    }

    /// Move `src` to `dest` as copy then delete. Not atomic: a failure after
    /// the copy leaves both files in place.
    pub fn move_file(&self, src: &str, dest: &str) -> Result<()> {
        let src = self.resolve(src)?;
        let dest = self.resolve(dest)?;
        if PathClassifier::same_location(&src.normalized, &dest.normalized) {
            return Err(GatewayError::SameLocation(src.display()));
        }
        if !self.target_exists(&src.target)? {
            return Err(GatewayError::FileNotFound(src.display()));
        }
        if self.target_exists(&dest.target)? {
            return Err(GatewayError::AlreadyExists(dest.display()));
        }
        self.copy_resolved(&src, &dest)?;
        self.delete_resolved(&src)
    }

    // ------------------------------------------------------------------
    // Whole-file helpers and streams
    // ------------------------------------------------------------------

    /// Open a stream on `path`.
    pub fn open(&self, path: &str, mode: FileMode, access: FileAccess) -> Result<CachingStream> {
        let resolved = self.resolve(path)?;
        self.open_resolved(&resolved, mode, access)
    }

    fn open_resolved(&self, resolved: &ResolvedPath, mode: FileMode, access: FileAccess) -> Result<CachingStream> {
        let display = resolved.display();
        match &resolved.target {
            StorageTarget::Local(local) => CachingStream::open_local(&local.path, &display, mode, access),
            StorageTarget::Remote(remote) => CachingStream::open_object(
                self.descriptor(&remote.key),
                &display,
                mode,
                access,
                &self.config.temp_dir(),
                self.multipart_config(),
            ),
        }
    }

    pub fn read_all_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let mut stream = self.open(path, FileMode::Open, FileAccess::Read)?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf)?;
        stream.close()?;
        Ok(buf)
    }

    pub fn read_all_text(&self, path: &str) -> Result<String> {
        let bytes = self.read_all_bytes(path)?;
        String::from_utf8(bytes).map_err(|e| GatewayError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Create or replace `path` with `data`.
    pub fn write_all_bytes(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut stream = self.open(path, FileMode::Create, FileAccess::Write)?;
        stream.write_all(data)?;
        stream.close()
    }

    pub fn write_all_text(&self, path: &str, text: &str) -> Result<()> {
        self.write_all_bytes(path, text.as_bytes())
    }

    /// Append `text`, creating the file if needed.
    pub fn append_all_text(&self, path: &str, text: &str) -> Result<()> {
        let mut stream = self.open(path, FileMode::Append, FileAccess::Write)?;
        stream.write_all(text.as_bytes())?;
        stream.close()
    }

    /// Upload a local file to `dest` in bounded parts through one multipart
    /// session.
    pub fn upload_multipart(&self, source: &Path, dest: &str) -> Result<MultipartCompleteInfo> {
        let resolved = self.resolve(dest)?;
        let StorageTarget::Remote(remote) = &resolved.target else {
            return Err(GatewayError::InvalidMode(format!("{} is on local disk; multipart needs an object", resolved.display())));
        };
        let mut file = File::open(source).map_err(|e| GatewayError::from_io(e, &source.display().to_string()))?;
        let mut coordinator = MultipartUploadCoordinator::new(self.descriptor(&remote.key), self.multipart_config());
        let info = coordinator.upload_from_reader(&mut file)?;
        info!(
            "uploaded {} to {} in {} parts ({} bytes)",
            source.display(),
            resolved.display(),
            info.parts,
            info.total_bytes
        );
        Ok(info)
    }

    // ------------------------------------------------------------------
    // Attributes and timestamps
    // ------------------------------------------------------------------

    fn existing_object(&self, resolved: &ResolvedPath, key: &str) -> Result<ObjectDescriptor> {
        let descriptor = self.descriptor(key);
        if !descriptor.exists()? {
            return Err(GatewayError::FileNotFound(resolved.display()));
        }
        Ok(descriptor)
    }

    fn local_metadata(path: &Path, display: &str) -> Result<fs::Metadata> {
        fs::metadata(path).map_err(|e| GatewayError::from_io(e, display))
    }

    pub fn get_attributes(&self, path: &str) -> Result<FileAttributes> {
        let resolved = self.resolve(path)?;
        match &resolved.target {
            StorageTarget::Local(local) => {
                let meta = Self::local_metadata(&local.path, &resolved.display())?;
                let name = local.path.file_name().and_then(|n| n.to_str());
                Ok(FileAttributes::from_local(&meta, name))
            }
            StorageTarget::Remote(remote) => {
                let mut descriptor = self.existing_object(&resolved, &remote.key)?;
                Ok(descriptor.attributes()?.or_normal())
            }
        }
    }

    /// Set attributes. On local disk only the read-only bit is applied.
    pub fn set_attributes(&self, path: &str, attrs: FileAttributes) -> Result<()> {
        let resolved = self.resolve(path)?;
        match &resolved.target {
            StorageTarget::Local(local) => {
                let meta = Self::local_metadata(&local.path, &resolved.display())?;
                let mut perms = meta.permissions();
                perms.set_readonly(attrs.contains(FileAttributes::READ_ONLY));
                fs::set_permissions(&local.path, perms).map_err(|e| GatewayError::from_io(e, &resolved.display()))
            }
            StorageTarget::Remote(remote) => {
                let mut descriptor = self.existing_object(&resolved, &remote.key)?;
                descriptor.set_attributes(attrs, true)
            }
        }
    }

    /// Last write time. Objects without the metadata fall back to the store's
    /// own modification time.
    pub fn get_last_write_time(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        let resolved = self.resolve(path)?;
        match &resolved.target {
            StorageTarget::Local(local) => {
                let meta = Self::local_metadata(&local.path, &resolved.display())?;
                Ok(meta.modified().ok().map(DateTime::<Utc>::from))
            }
            StorageTarget::Remote(remote) => {
                let mut descriptor = self.existing_object(&resolved, &remote.key)?;
                if let Some(t) = descriptor.last_write_time()? {
                    return Ok(Some(t));
                }
                Ok(descriptor.stat()?.and_then(|s| s.last_modified).as_deref().and_then(decode_time))
            }
        }
    }

    pub fn set_last_write_time(&self, path: &str, time: DateTime<Utc>) -> Result<()> {
        let resolved = self.resolve(path)?;
        match &resolved.target {
            StorageTarget::Local(local) => {
                let file = File::options()
                    .write(true)
                    .open(&local.path)
                    .map_err(|e| GatewayError::from_io(e, &resolved.display()))?;
                file.set_modified(SystemTime::from(time))?;
                Ok(())
            }
            StorageTarget::Remote(remote) => {
                let mut descriptor = self.existing_object(&resolved, &remote.key)?;
                descriptor.set_last_write_time(time, true)
            }
        }
    }

    pub fn get_creation_time(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        let resolved = self.resolve(path)?;
        match &resolved.target {
            StorageTarget::Local(local) => {
                let meta = Self::local_metadata(&local.path, &resolved.display())?;
                Ok(meta.created().ok().map(DateTime::<Utc>::from))
            }
            StorageTarget::Remote(remote) => {
                let mut descriptor = self.existing_object(&resolved, &remote.key)?;
                descriptor.creation_time()
            }
        }
    }

    pub fn metadata(&self, path: &str) -> Result<FileMetadataSnapshot> {
        let resolved = self.resolve(path)?;
        FileMetadataSnapshot::capture(&resolved, &self.store)
    }

    // ------------------------------------------------------------------
    // Directories and URLs
    // ------------------------------------------------------------------

    /// Files directly inside `dir`, local and remote merged, as virtual paths
    /// (or OS paths for directories outside the local root).
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        let normalized = self.classifier.normalize(dir)?;
        let local_dir = self.classifier.local_path(&normalized);
        let mut out = Vec::new();

        match fs::read_dir(&local_dir) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry?;
                    if !entry.file_type()?.is_file() {
                        continue;
                    }
                    let name = entry.file_name().to_string_lossy().into_owned();
                    out.push(match &normalized {
                        NormalizedPath::Virtual(rel) if rel.is_empty() => format!("{}{}", VIRTUAL_ROOT_PREFIX, name),
                        NormalizedPath::Virtual(rel) => format!("{}{}/{}", VIRTUAL_ROOT_PREFIX, rel, name),
                        NormalizedPath::Absolute(p) => p.join(&name).display().to_string(),
                    });
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(GatewayError::from_io(e, &normalized.to_string())),
        }

        if let NormalizedPath::Virtual(rel) = &normalized {
            let dir = DirectoryPlaceholder::for_directory(&self.descriptor(rel), rel);
            out.extend(dir.list_files()?.into_iter().map(|key| format!("{}{}", VIRTUAL_ROOT_PREFIX, key)));
        }

        out.sort();
        out.dedup();
        Ok(out)
    }

    /// When a child of `dir` was last created, deleted or renamed. A directory
    /// present on both backends reports the later of the two.
    pub fn directory_last_write_time(&self, dir: &str) -> Result<Option<DateTime<Utc>>> {
        let normalized = self.classifier.normalize(dir)?;
        let local_dir = self.classifier.local_path(&normalized);
        let local = fs::metadata(&local_dir)
            .ok()
            .filter(|meta| meta.is_dir())
            .and_then(|meta| meta.modified().ok())
            .map(DateTime::<Utc>::from);

        let NormalizedPath::Virtual(rel) = &normalized else {
            return Ok(local);
        };
        let remote = match DirectoryPlaceholder::for_directory(&self.descriptor(rel), rel).last_write_time() {
            Ok(t) => t,
            Err(e) if local.is_some() => {
                warn!("placeholder time for {} unavailable: {}", dir, e);
                None
            }
            Err(e) => return Err(e),
        };
        Ok(local.max(remote))
    }

    /// URL a client can fetch `path` from.
    ///
    /// Local files under the root map to a site-relative URL. Remote objects
    /// get a direct link on a public container and a signed one otherwise.
    pub fn public_url(&self, path: &str) -> Result<String> {
        let resolved = self.resolve(path)?;
        match (&resolved.target, &resolved.normalized) {
            (StorageTarget::Local(_), NormalizedPath::Virtual(rel)) => Ok(format!("/{}", rel)),
            (StorageTarget::Local(_), NormalizedPath::Absolute(_)) => {
                Err(GatewayError::invalid_path(path, "outside the local root; no URL"))
            }
            (StorageTarget::Remote(remote), _) => {
                let descriptor = self.descriptor(&remote.key);
                match (self.config.public_container, self.config.public_base_url.as_deref()) {
                    (true, Some(base)) => Ok(format!(
                        "{}/{}/{}",
                        base.trim_end_matches('/'),
                        descriptor.container(),
                        remote.key
                    )),
                    _ => descriptor.signed_url(self.config.signed_url_ttl),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_store::FileSystemObjectStore;
    use tempfile::TempDir;

    fn gateway(tmp: &TempDir) -> UnifiedFile {
        let site = tmp.path().join("site");
        fs::create_dir_all(&site).unwrap();
        fs::create_dir_all(tmp.path().join("store/media")).unwrap();
        let store = Arc::new(FileSystemObjectStore::new(tmp.path().join("store"), "media"));
        let cfg = GatewayConfig::new(&site, "media").with_temp_dir(tmp.path().join("tmp"));
        UnifiedFile::new(cfg, store)
    }

    #[test]
    fn exists_never_errors() {
        let tmp = TempDir::new().unwrap();
        let gw = gateway(&tmp);
        assert!(!gw.exists(""));
        assert!(!gw.exists("~/bad|name"));
        assert!(!gw.exists("~/docs_$folder$"));
        assert!(!gw.exists("~/missing.txt"));
    }

    #[test]
    fn remote_delete_touches_parent() {
        let tmp = TempDir::new().unwrap();
        let gw = gateway(&tmp);
        gw.write_all_text("~/docs/a.txt", "x").unwrap();
        assert!(tmp.path().join("store/media/docs/a.txt").is_file());

        gw.delete("~/docs/a.txt").unwrap();
        assert!(!gw.exists("~/docs/a.txt"));
        assert!(gw.directory_last_write_time("~/docs").unwrap().is_some());
    }

    #[test]
    fn copy_across_backends() {
        let tmp = TempDir::new().unwrap();
        let gw = gateway(&tmp);
        fs::write(tmp.path().join("site/local.txt"), b"from disk").unwrap();

        gw.copy("~/local.txt", "~/remote/copy.txt", false).unwrap();
        assert_eq!(gw.read_all_text("~/remote/copy.txt").unwrap(), "from disk");
        assert!(gw.get_creation_time("~/remote/copy.txt").unwrap().is_some());

        let out = tmp.path().join("out.txt");
        gw.copy("~/remote/copy.txt", out.to_str().unwrap(), false).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"from disk");
    }

    #[test]
    fn copy_onto_itself_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let gw = gateway(&tmp);
        gw.write_all_text("~/a.txt", "x").unwrap();
        assert!(matches!(gw.copy("~/a.txt", "~/A.txt", true), Err(GatewayError::SameLocation(_))));
        assert_eq!(gw.read_all_text("~/a.txt").unwrap(), "x");
    }

    #[test]
    fn local_attributes_and_times() {
        let tmp = TempDir::new().unwrap();
        let gw = gateway(&tmp);
        fs::write(tmp.path().join("site/a.txt"), b"x").unwrap();

        let t = DateTime::parse_from_rfc3339("2020-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        gw.set_last_write_time("~/a.txt", t).unwrap();
        assert_eq!(gw.get_last_write_time("~/a.txt").unwrap(), Some(t));

        gw.set_attributes("~/a.txt", FileAttributes::READ_ONLY).unwrap();
        assert!(gw.get_attributes("~/a.txt").unwrap().contains(FileAttributes::READ_ONLY));
        gw.set_attributes("~/a.txt", FileAttributes::NORMAL).unwrap();
        assert!(!gw.get_attributes("~/a.txt").unwrap().contains(FileAttributes::READ_ONLY));
    }

    #[test]
    fn remote_attributes_require_existence() {
        let tmp = TempDir::new().unwrap();
        let gw = gateway(&tmp);
        assert!(matches!(gw.get_attributes("~/nope.txt"), Err(GatewayError::FileNotFound(_))));

        gw.write_all_text("~/r.txt", "x").unwrap();
        gw.set_attributes("~/r.txt", FileAttributes::HIDDEN | FileAttributes::ARCHIVE).unwrap();
        assert_eq!(gw.get_attributes("~/r.txt").unwrap(), FileAttributes::HIDDEN | FileAttributes::ARCHIVE);
        assert!(gw.metadata("~/r.txt").unwrap().exists);
    }

    #[test]
    fn list_merges_backends() {
        let tmp = TempDir::new().unwrap();
        let gw = gateway(&tmp);
        fs::create_dir_all(tmp.path().join("site/docs")).unwrap();
        fs::write(tmp.path().join("site/docs/local.txt"), b"l").unwrap();
        gw.write_all_text("~/docs/remote.txt", "r").unwrap();

        assert_eq!(gw.list("~/docs").unwrap(), vec!["~/docs/local.txt".to_string(), "~/docs/remote.txt".to_string()]);
    }

    #[test]
    fn public_urls() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("site")).unwrap();
        fs::create_dir_all(tmp.path().join("store/media")).unwrap();
        fs::write(tmp.path().join("site/index.html"), b"<html/>").unwrap();
        let store = Arc::new(FileSystemObjectStore::new(tmp.path().join("store"), "media"));

        let cfg = GatewayConfig::new(tmp.path().join("site"), "media").with_public_base_url("https://cdn.example.com/");
        let public = UnifiedFile::new(cfg, store.clone());
        assert_eq!(public.public_url("~/index.html").unwrap(), "/index.html");
        assert_eq!(public.public_url("~/img/a.png").unwrap(), "https://cdn.example.com/media/img/a.png");

        let private = UnifiedFile::new(GatewayConfig::new(tmp.path().join("site"), "media"), store);
        assert!(private.public_url("~/img/a.png").unwrap().contains("signature="));
    }
}
