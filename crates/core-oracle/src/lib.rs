//! Interestingness-oracle invocation.
//!
//! The oracle is an opaque external executable: `oracle candidate` run with
//! the candidate's scratch directory as working directory, exit status zero
//! meaning "still interesting". The runner never reads or interprets the
//! candidate itself. Abnormal exits (signals, crash codes) count as reject so
//! a flaky tool under the oracle cannot poison the run.

use anyhow::{Context, Result};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle script not found: {0}")]
    NotFound(PathBuf),
    #[error("oracle script is not executable: {0}")]
    NotExecutable(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Oracle {
    script: PathBuf,
    verbose: bool,
}

impl Oracle {
    /// Validate and absolutize the oracle script. The absolute path matters:
    /// every invocation runs from a scratch directory, so a relative script
    /// path would stop resolving the moment the first candidate is tried.
    pub fn new(script: &Path, verbose: bool) -> Result<Self, OracleError> {
        if !script.is_file() {
            return Err(OracleError::NotFound(script.to_path_buf()));
        }
        let mode = script
            .metadata()
            .map_err(|_| OracleError::NotFound(script.to_path_buf()))?
            .permissions()
            .mode();
        if mode & 0o111 == 0 {
            return Err(OracleError::NotExecutable(script.to_path_buf()));
        }
        let script = script
            .canonicalize()
            .map_err(|_| OracleError::NotFound(script.to_path_buf()))?;
        Ok(Self { script, verbose })
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    fn command(&self, candidate: &Path) -> Command {
        let mut cmd = Command::new(&self.script);
        cmd.arg(candidate);
        if let Some(dir) = candidate.parent() {
            cmd.current_dir(dir);
        }
        if self.verbose {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run the oracle to completion. `Ok(true)` iff it exited with status 0.
    pub fn check(&self, candidate: &Path) -> Result<bool> {
        let status = self
            .command(candidate)
            .status()
            .with_context(|| format!("running oracle {}", self.script.display()))?;
        let interesting = status.success();
        trace!(
            target: "oracle",
            candidate = %candidate.display(),
            code = status.code(),
            interesting,
            "checked"
        );
        Ok(interesting)
    }

    /// Start the oracle without waiting, placed in its own process group so a
    /// later cancellation can take down anything it spawned. The caller owns
    /// reaping.
    pub fn spawn_worker(&self, candidate: &Path) -> Result<Child> {
        let child = self
            .command(candidate)
            .process_group(0)
            .spawn()
            .with_context(|| format!("spawning oracle {}", self.script.display()))?;
        debug!(
            target: "oracle",
            candidate = %candidate.display(),
            pid = child.id(),
            "worker_spawned"
        );
        Ok(child)
    }
}
