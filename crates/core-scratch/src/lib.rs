//! Tracked per-trial scratch directories.
//!
//! Every candidate gets its own directory under the system temp root, named
//! `whittle-XXXXXX`. The workspace records every directory it hands out so
//! that teardown (normal completion or a caught signal) can remove all of
//! them in one bounded sweep. With the keep switch set (save-temps) nothing
//! is ever deleted.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Prefix for every scratch directory created by this run.
pub const SCRATCH_PREFIX: &str = "whittle-";

pub struct ScratchSpace {
    dirs: Mutex<Vec<PathBuf>>,
    keep: bool,
}

impl ScratchSpace {
    pub fn new(keep: bool) -> Self {
        Self {
            dirs: Mutex::new(Vec::new()),
            keep,
        }
    }

    /// Create and track a fresh scratch directory. Creation failure is fatal
    /// to the caller; there is no reduction without scratch space.
    pub fn create(&self) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .context("creating scratch directory")?;
        // Detach from the TempDir guard; lifetime is managed by this registry.
        let path = dir.keep();
        self.dirs.lock().unwrap().push(path.clone());
        debug!(target: "scratch", dir = %path.display(), "created");
        Ok(path)
    }

    /// Remove one directory and stop tracking it. Retired candidates release
    /// their scratch as soon as a verdict lands, so the footprint stays at
    /// one directory per in-flight worker.
    pub fn release(&self, path: &Path) {
        self.dirs.lock().unwrap().retain(|p| p != path);
        if self.keep {
            return;
        }
        match std::fs::remove_dir_all(path) {
            Ok(()) => debug!(target: "scratch", dir = %path.display(), "released"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(target: "scratch", dir = %path.display(), %err, "release_failed");
            }
        }
    }

    /// Remove every directory still tracked. Safe to call more than once and
    /// from teardown paths; failures are logged, not propagated.
    pub fn remove_all(&self) {
        let dirs = std::mem::take(&mut *self.dirs.lock().unwrap());
        if self.keep {
            if !dirs.is_empty() {
                debug!(target: "scratch", count = dirs.len(), "kept_on_request");
            }
            return;
        }
        for path in dirs {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => debug!(target: "scratch", dir = %path.display(), "removed"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(target: "scratch", dir = %path.display(), %err, "remove_failed");
                }
            }
        }
    }

    /// Number of directories currently tracked.
    pub fn tracked(&self) -> usize {
        self.dirs.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_release_roundtrip() {
        let space = ScratchSpace::new(false);
        let dir = space.create().unwrap();
        assert!(dir.is_dir());
        assert!(
            dir.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(SCRATCH_PREFIX)
        );
        assert_eq!(space.tracked(), 1);

        space.release(&dir);
        assert!(!dir.exists());
        assert_eq!(space.tracked(), 0);
    }

    #[test]
    fn remove_all_sweeps_everything() {
        let space = ScratchSpace::new(false);
        let a = space.create().unwrap();
        let b = space.create().unwrap();
        std::fs::write(a.join("candidate.c"), "int x;").unwrap();
        space.remove_all();
        assert!(!a.exists());
        assert!(!b.exists());
        assert_eq!(space.tracked(), 0);
        // Idempotent.
        space.remove_all();
    }

    #[test]
    fn keep_mode_leaves_directories_in_place() {
        let space = ScratchSpace::new(true);
        let dir = space.create().unwrap();
        space.release(&dir);
        assert!(dir.exists(), "save-temps must not delete");
        space.remove_all();
        assert!(dir.exists());
        // Clean up behind the test itself.
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn release_tolerates_missing_dir() {
        let space = ScratchSpace::new(false);
        let dir = space.create().unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        space.release(&dir);
        assert_eq!(space.tracked(), 0);
    }
}
