//! Host facilities used by the conversion queue: preview handles and downloads.
//!
//! A preview handle is a revocable reference to an item's source bytes. Every
//! handle created through [`MediaHost::create_preview`] must be revoked exactly
//! once; [`LocalHost`] tracks live handles so leaks are observable.

use std::collections::HashSet;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Revocable reference used to render a thumbnail of an item's source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transient handle over converted bytes, alive only for one save.
#[derive(Debug)]
pub struct DownloadHandle<'a> {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: &'a [u8],
}

pub trait MediaHost: Send + Sync {
    /// Creates a preview handle for freshly added source bytes.
    fn create_preview(&self, name: &str, bytes: &Arc<[u8]>) -> PreviewHandle;

    /// Releases a preview handle. Called exactly once per handle.
    fn revoke_preview(&self, handle: &PreviewHandle);

    /// Hands converted bytes to the host's save mechanism. Existing files are
    /// never replaced; the returned path is where the bytes actually landed.
    fn save(&self, download: &DownloadHandle<'_>) -> io::Result<PathBuf>;
}

/// Filesystem host: downloads land in `out_dir`, previews are opaque ids.
pub struct LocalHost {
    out_dir: PathBuf,
    live: Mutex<HashSet<PreviewHandle>>,
}

impl LocalHost {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            live: Mutex::new(HashSet::new()),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Number of preview handles created but not yet revoked.
    pub fn live_previews(&self) -> usize {
        self.live.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl MediaHost for LocalHost {
    fn create_preview(&self, name: &str, bytes: &Arc<[u8]>) -> PreviewHandle {
        let handle = PreviewHandle::new(format!("preview://{}", Uuid::new_v4()));
        debug!("Preview {} for '{}' ({} bytes)", handle, name, bytes.len());
        self.live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle.clone());
        handle
    }

    fn revoke_preview(&self, handle: &PreviewHandle) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(handle);
        if !removed {
            warn!("Preview {} revoked twice or never created", handle);
        }
    }

    /// Never replaces an existing file: a taken name becomes `stem (1).ext`,
    /// `stem (2).ext` and so on.
    fn save(&self, download: &DownloadHandle<'_>) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.out_dir)?;
        let (mut file, path) = create_unique(&self.out_dir, &download.file_name)?;
        if let Err(e) = file.write_all(download.bytes) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }
        debug!(
            "Saved {} ({}, {} bytes)",
            path.display(),
            download.media_type,
            download.bytes.len()
        );
        Ok(path)
    }
}

/// Upper bound on `stem (n).ext` attempts before giving up.
const MAX_DUPLICATE_NAMES: u32 = 9999;

/// Creates `dir/name`, or the first free `stem (n).ext` variant of it.
fn create_unique(dir: &Path, name: &str) -> io::Result<(File, PathBuf)> {
    let requested = Path::new(name);
    let stem = requested
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = requested.extension().map(|e| e.to_string_lossy().into_owned());

    for n in 0..=MAX_DUPLICATE_NAMES {
        let candidate = match (n, &ext) {
            (0, _) => name.to_string(),
            (n, Some(ext)) => format!("{stem} ({n}).{ext}"),
            (n, None) => format!("{stem} ({n})"),
        };
        let path = dir.join(candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for '{}' in {}", name, dir.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previews_are_tracked_until_revoked() {
        let host = LocalHost::new(std::env::temp_dir());
        let bytes: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);

        let a = host.create_preview("a.png", &bytes);
        let b = host.create_preview("b.png", &bytes);
        assert_ne!(a, b);
        assert_eq!(host.live_previews(), 2);

        host.revoke_preview(&a);
        assert_eq!(host.live_previews(), 1);
        host.revoke_preview(&a);
        assert_eq!(host.live_previews(), 1);
    }

    #[test]
    fn save_writes_into_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalHost::new(dir.path().join("nested"));

        let path = host
            .save(&DownloadHandle {
                file_name: "photo.png".to_string(),
                media_type: "image/png",
                bytes: b"png-bytes",
            })
            .unwrap();

        assert_eq!(path, dir.path().join("nested").join("photo.png"));
        assert_eq!(std::fs::read(path).unwrap(), b"png-bytes");
    }

    #[test]
    fn save_never_replaces_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("photo.jpeg");
        std::fs::write(&original, b"original").unwrap();
        let host = LocalHost::new(dir.path());

        let save = |bytes: &'static [u8]| {
            host.save(&DownloadHandle {
                file_name: "photo.jpeg".to_string(),
                media_type: "image/jpeg",
                bytes,
            })
            .unwrap()
        };
        let first = save(b"first");
        let second = save(b"second");

        assert_eq!(first, dir.path().join("photo (1).jpeg"));
        assert_eq!(second, dir.path().join("photo (2).jpeg"));
        assert_eq!(std::fs::read(&original).unwrap(), b"original");
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
    }
}
