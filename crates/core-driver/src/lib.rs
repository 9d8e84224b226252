//! The reduction session: startup checks, phase ordering, best-file
//! bookkeeping, and finalization.
//!
//! Phase order is fixed: an initial sweep of cheap passes, then the main
//! fixpoint loop (with a one-time preprocessing step when configured), then
//! one cleanup sweep. The on-disk best file is oracle-accepted from the first
//! pass to termination; the original input is rewritten exactly once, at the
//! very end, from the best.

mod progress;

pub use progress::{DiffPrinter, ProgressPrinter, print_pct};

use anyhow::{Context, Result};
use core_delta::{AcceptObserver, DeltaLoop, DeltaOptions, LoopExit, RunStats};
use core_oracle::Oracle;
use core_pass::{Pass, PassDescriptor, Phase, RegisteredPass, Registry};
use core_reducers::LinePass;
use core_scratch::ScratchSpace;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("pass prerequisites not satisfied: {0}")]
    Prereq(String),
    #[error("oracle rejected the current best artifact")]
    BestRejected,
    #[error("preprocessor command failed: {0}")]
    Preprocess(String),
    #[error("interrupted by signal")]
    Interrupted,
}

/// Option set recognized by the driver. Registry assembly options (sanitize,
/// slow groups, default suppression) act before a driver exists and live with
/// the catalog instead.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub workers: usize,
    pub preprocess_cmd: Option<String>,
    pub fuzz: bool,
    pub sanity_check_each_pass: bool,
    pub skip_initial: bool,
    pub print_diff: bool,
    pub save_temps: bool,
    /// Reserved: accepted and ignored.
    pub cache: bool,
    pub verbose: bool,
    pub giveup_after: Option<u64>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            preprocess_cmd: None,
            fuzz: false,
            sanity_check_each_pass: false,
            skip_initial: false,
            print_diff: false,
            save_temps: false,
            cache: false,
            verbose: false,
            giveup_after: Some(500),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub orig_size: u64,
    pub final_size: u64,
    pub elapsed: Duration,
}

pub struct Driver {
    options: DriverOptions,
    registry: Registry,
    oracle: Oracle,
    scratch: Arc<ScratchSpace>,
    input: PathBuf,
    best: PathBuf,
    file_name: OsString,
    orig_size: u64,
    stats: RunStats,
    started: Instant,
}

fn file_size(path: &Path) -> Result<u64> {
    Ok(path
        .metadata()
        .with_context(|| format!("sizing {}", path.display()))?
        .len())
}

impl Driver {
    /// Set up the session: validate both inputs, then materialize the two
    /// sibling files beside the input: `<name>.orig` (pristine copy) and
    /// `<name>.best` (the working artifact).
    pub fn new(
        options: DriverOptions,
        registry: Registry,
        oracle_script: &Path,
        input: &Path,
    ) -> Result<Self> {
        let oracle = Oracle::new(oracle_script, options.verbose)?;
        let input = input
            .canonicalize()
            .with_context(|| format!("artifact {} not found", input.display()))?;
        let meta = input.metadata()?;
        if !meta.is_file() || meta.permissions().readonly() {
            anyhow::bail!("artifact {} must be a writable file", input.display());
        }
        let file_name = input
            .file_name()
            .map(OsString::from)
            .context("artifact path has no file name")?;

        let mut orig_name = file_name.clone();
        orig_name.push(".orig");
        let orig = input.with_file_name(&orig_name);
        std::fs::copy(&input, &orig)
            .with_context(|| format!("preserving original as {}", orig.display()))?;

        let mut best_name = file_name.clone();
        best_name.push(".best");
        let best = input.with_file_name(&best_name);
        std::fs::copy(&input, &best)
            .with_context(|| format!("seeding best as {}", best.display()))?;

        info!(
            target: "driver",
            input = %input.display(),
            size = meta.len(),
            workers = options.workers,
            "session_created"
        );

        Ok(Self {
            scratch: Arc::new(ScratchSpace::new(options.save_temps)),
            orig_size: meta.len(),
            stats: RunStats::new(),
            started: Instant::now(),
            options,
            registry,
            oracle,
            input,
            best,
            file_name,
        })
    }

    /// Run the whole reduction to its fixpoint.
    pub fn run(mut self) -> Result<RunReport> {
        // Prerequisite probes come first: a missing tool must abort before
        // any scratch directory exists.
        for (family, pass) in self.registry.families() {
            if !pass.check_prereqs() {
                return Err(DriverError::Prereq(family.to_string()).into());
            }
        }

        self.sanity_check()
            .context("the oracle does not accept the original input")?;

        if !self.options.skip_initial {
            self.run_phase(Phase::Initial)?;
        }

        // Main fixpoint: sweep until a full sweep stops shrinking the best.
        let mut first_sweep = true;
        loop {
            if first_sweep && let Some(cmd) = self.options.preprocess_cmd.clone() {
                self.preprocess(&cmd)?;
            }
            first_sweep = false;

            let size_prev = file_size(&self.best)?;
            self.run_phase(Phase::Main)?;
            let size_now = file_size(&self.best)?;
            debug!(target: "driver.phase", size_prev, size_now, "main_sweep_done");
            if size_now >= size_prev {
                break;
            }
        }

        self.run_phase(Phase::Cleanup)?;
        self.finalize()
    }

    fn run_phase(&mut self, phase: Phase) -> Result<()> {
        info!(target: "driver.phase", phase = phase.as_str(), "phase_started");
        // Collect owned handles up front; each delta invocation needs the
        // driver mutably for statistics.
        let entries: Vec<RegisteredPass> = self
            .registry
            .iterate(phase)
            .into_iter()
            .map(|e| RegisteredPass {
                descriptor: e.descriptor.clone(),
                pass: e.pass.clone(),
            })
            .collect();
        for entry in &entries {
            self.run_pass(entry)?;
        }
        Ok(())
    }

    fn run_pass(&mut self, entry: &RegisteredPass) -> Result<()> {
        if core_lifecycle::interrupted() {
            return self.teardown();
        }
        if self.options.sanity_check_each_pass {
            self.sanity_check()?;
        }

        let delta_options = DeltaOptions {
            workers: self.options.workers,
            fuzz: self.options.fuzz,
            giveup_after: self.options.giveup_after,
        };
        let mut observers: Vec<Box<dyn AcceptObserver>> =
            vec![Box::new(ProgressPrinter::new(self.orig_size))];
        if self.options.print_diff {
            observers.push(Box::new(DiffPrinter));
        }

        let delta = DeltaLoop::new(
            &self.oracle,
            &self.scratch,
            &delta_options,
            &observers,
            &self.file_name,
        );
        let outcome = delta.run(entry, &self.best, &mut self.stats)?;
        if outcome.exit == LoopExit::Interrupted {
            return self.teardown();
        }
        Ok(())
    }

    /// The one-time preprocessing step at the head of the main loop: drop
    /// whole lines first, rewrite through the external preprocessor (the only
    /// step allowed to grow the best), re-check, then re-run line passes at
    /// every granularity.
    fn preprocess(&mut self, cmd: &str) -> Result<()> {
        info!(target: "driver.preprocess", cmd, "preprocess_started");
        let lines: Arc<dyn Pass> = Arc::new(LinePass);
        self.run_pass(&RegisteredPass {
            descriptor: PassDescriptor::new("lines", "0"),
            pass: lines.clone(),
        })?;

        let mut parts = cmd.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DriverError::Preprocess("empty command".into()))?;
        let dir = self.scratch.create()?;
        let candidate = dir.join(&self.file_name);
        std::fs::copy(&self.best, &candidate)?;
        let mut command = Command::new(program);
        command
            .args(parts)
            .arg(&candidate)
            .current_dir(&dir)
            .stdin(Stdio::null());
        if !self.options.verbose {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let status = command
            .status()
            .with_context(|| format!("running preprocessor {program}"))?;
        if !status.success() {
            self.scratch.release(&dir);
            return Err(DriverError::Preprocess(cmd.to_string()).into());
        }
        std::fs::copy(&candidate, &self.best)?;
        self.scratch.release(&dir);
        self.sanity_check()
            .context("the oracle does not accept the preprocessed artifact")?;

        for arg in ["0", "1", "2", "10"] {
            self.run_pass(&RegisteredPass {
                descriptor: PassDescriptor::new("lines", arg),
                pass: lines.clone(),
            })?;
        }
        Ok(())
    }

    /// Assert the standing invariant: the best file is still interesting.
    fn sanity_check(&self) -> Result<()> {
        let dir = self.scratch.create()?;
        let copy = dir.join(&self.file_name);
        std::fs::copy(&self.best, &copy)
            .with_context(|| format!("staging {} for sanity check", self.best.display()))?;
        let accepted = self.oracle.check(&copy)?;
        self.scratch.release(&dir);
        if accepted {
            Ok(())
        } else {
            Err(DriverError::BestRejected.into())
        }
    }

    fn teardown(&mut self) -> Result<()> {
        warn!(target: "driver", "interrupted_teardown");
        if core_lifecycle::is_root() {
            self.scratch.remove_all();
        }
        Err(DriverError::Interrupted.into())
    }

    /// Copy the best over the input (its only write), then report.
    fn finalize(self) -> Result<RunReport> {
        std::fs::copy(&self.best, &self.input)
            .with_context(|| format!("installing result into {}", self.input.display()))?;
        self.scratch.remove_all();

        let final_size = file_size(&self.input)?;
        let elapsed = self.started.elapsed();

        println!("pass statistics:");
        for line in self.stats.render() {
            println!("  {line}");
        }
        println!();
        let reduced = std::fs::read(&self.input)?;
        std::io::stdout()
            .write_all(&reduced)
            .context("printing reduced artifact")?;
        println!();
        print_pct(self.orig_size, final_size);
        println!("elapsed: {:.1}s", elapsed.as_secs_f64());

        info!(
            target: "driver",
            orig_size = self.orig_size,
            final_size,
            elapsed_ms = elapsed.as_millis() as u64,
            "run_finished"
        );
        Ok(RunReport {
            orig_size: self.orig_size,
            final_size,
            elapsed,
        })
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        // Error and panic paths still sweep scratch; redundant on success.
        if core_lifecycle::is_root() {
            self.scratch.remove_all();
        }
    }
}
