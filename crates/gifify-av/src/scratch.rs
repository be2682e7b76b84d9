//! Scratch-file management for conversions.
//!
//! Two kinds of temporary files exist:
//!
//! - per-request upload/output files allocated by [`ScratchSpace`], named
//!   with random suffixes so concurrent requests never collide;
//! - the pipeline's intermediate artifact, owned by a [`ScratchPath`] guard
//!   that unlinks it on every exit path.
//!
//! Removal is advisory. A failure to delete is logged and never replaces the
//! job's real outcome.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

/// Directory in which per-request scratch files are created.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    /// Use `dir` (created if missing) for scratch files.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Use the system temp directory.
    pub fn system() -> Self {
        Self {
            dir: std::env::temp_dir(),
        }
    }

    /// Create a new, empty, uniquely named file and return its guard.
    ///
    /// The file is deleted when the returned [`TempPath`] is dropped.
    pub fn allocate(&self, prefix: &str, suffix: &str) -> io::Result<TempPath> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.dir)?;
        Ok(file.into_temp_path())
    }
}

/// Guard over a file the pipeline creates and must not leave behind.
#[derive(Debug)]
pub struct ScratchPath {
    path: PathBuf,
    armed: bool,
}

impl ScratchPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now instead of at drop time.
    pub fn remove(mut self) {
        self.armed = false;
        advisory_remove(&self.path);
    }
}

impl Drop for ScratchPath {
    fn drop(&mut self) {
        if self.armed {
            advisory_remove(&self.path);
        }
    }
}

/// Delete `path`, logging instead of failing.
pub fn advisory_remove(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed scratch file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch file"),
    }
}

/// Sibling path used for the processor's output when the optimizer will
/// rewrite it: `out.gif` → `out.tmp.gif`.
pub fn intermediate_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gif".to_string());
    output.with_file_name(format!("{stem}.tmp.{ext}"))
}
