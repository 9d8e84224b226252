//! The speculative parallel delta loop.
//!
//! One invocation drives one `(name, arg)` pass until it stops producing
//! candidates. Workers are independent oracle processes: worker *k+1* is
//! launched from the post-advance state of worker *k*, i.e. under the
//! assumption that worker *k*'s candidate will be rejected. Results are
//! consumed strictly in submission order, so an acceptance can discard every
//! later worker and rewind to the accepted candidate's pre-advance state
//! without ever acting on speculation from an invalidated state line.
//!
//! The on-disk best file is written only here, only by the orchestrator, and
//! only after the oracle accepted the exact candidate being copied over it.

mod stats;

pub use stats::RunStats;

use anyhow::{Context, Result, bail};
use core_oracle::Oracle;
use core_pass::{Pass, PassState, RegisteredPass, TransformOutcome};
use core_scratch::ScratchSpace;
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Knobs for one run of the loop.
#[derive(Debug, Clone)]
pub struct DeltaOptions {
    /// Maximum in-flight workers.
    pub workers: usize,
    /// Keep advancing past extra candidates while a fair coin lands heads.
    pub fuzz: bool,
    /// Abandon the pass after this many consecutive rejections; `None`
    /// disables the heuristic.
    pub giveup_after: Option<u64>,
}

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The pass reported `Stop` and every verdict is in.
    Exhausted,
    /// The give-up heuristic fired.
    GaveUp,
    /// A terminating signal was observed; the caller owns teardown.
    Interrupted,
}

/// Per-invocation result summary.
#[derive(Debug, Clone, Copy)]
pub struct DeltaOutcome {
    pub exit: LoopExit,
    pub good: u64,
    pub bad: u64,
}

/// Hook invoked after the oracle accepted `candidate`, before it replaces
/// `best`. Progress printing and diffing hang off this.
pub trait AcceptObserver {
    fn accepted(&self, best: &Path, candidate: &Path);
}

/// One speculative in-flight candidate. `pid` is `None` once the worker has
/// been reaped; `result` holds the verdict from then on.
struct Variant {
    pid: Option<Pid>,
    pre_state: Box<dyn PassState>,
    dir: PathBuf,
    candidate: PathBuf,
    result: Option<bool>,
}

pub struct DeltaLoop<'a> {
    oracle: &'a Oracle,
    scratch: &'a ScratchSpace,
    options: &'a DeltaOptions,
    observers: &'a [Box<dyn AcceptObserver>],
    /// Candidates are materialized under this name (the input's file name),
    /// so oracles keyed on the artifact name keep working.
    file_name: &'a OsStr,
}

impl<'a> DeltaLoop<'a> {
    pub fn new(
        oracle: &'a Oracle,
        scratch: &'a ScratchSpace,
        options: &'a DeltaOptions,
        observers: &'a [Box<dyn AcceptObserver>],
        file_name: &'a OsStr,
    ) -> Self {
        Self {
            oracle,
            scratch,
            options,
            observers,
            file_name,
        }
    }

    /// Drive `entry` to its terminal condition against `best`. Workers never
    /// outlive the invocation: any error path cancels whatever is in flight.
    pub fn run(
        &self,
        entry: &RegisteredPass,
        best: &Path,
        stats: &mut RunStats,
    ) -> Result<DeltaOutcome> {
        let mut inflight: VecDeque<Variant> = VecDeque::new();
        let result = self.drive(entry, best, stats, &mut inflight);
        if result.is_err() {
            self.cancel_all(&mut inflight);
        }
        result
    }

    fn drive(
        &self,
        entry: &RegisteredPass,
        best: &Path,
        stats: &mut RunStats,
        inflight: &mut VecDeque<Variant>,
    ) -> Result<DeltaOutcome> {
        let descriptor = &entry.descriptor;
        let pass = &entry.pass;
        let label = descriptor.label();
        debug!(target: "delta.loop", pass = %label, "pass_started");

        // Initial state comes from a scratch copy of the current best.
        let init_dir = self.scratch.create()?;
        let init_copy = init_dir.join(self.file_name);
        std::fs::copy(best, &init_copy)
            .with_context(|| format!("seeding state for {label}"))?;
        let mut state = pass.new_state(&init_copy, &descriptor.arg)?;
        self.scratch.release(&init_dir);

        let mut good = 0u64;
        let mut bad = 0u64;
        let mut since_success = 0u64;
        let mut stopped = false;
        let workers = self.options.workers.max(1);

        loop {
            if core_lifecycle::interrupted() {
                self.cancel_all(inflight);
                return Ok(DeltaOutcome {
                    exit: LoopExit::Interrupted,
                    good,
                    bad,
                });
            }

            // Fill the speculation window.
            while !stopped && inflight.len() < workers {
                let dir = self.scratch.create()?;
                let candidate = dir.join(self.file_name);
                std::fs::copy(best, &candidate)
                    .with_context(|| format!("staging candidate for {label}"))?;

                let (outcome, produced) =
                    pass.transform(&candidate, &descriptor.arg, state)?;
                if outcome == TransformOutcome::Stop {
                    state = produced;
                    stopped = true;
                    self.scratch.release(&dir);
                    break;
                }

                // Snapshot before advancing: an acceptance removes the
                // opportunity the advance would have stepped past.
                let pre_state = produced.clone();
                let mut next = pass.advance(&candidate, &descriptor.arg, produced)?;
                if self.options.fuzz {
                    while rand::random::<bool>() {
                        next = pass.advance(&candidate, &descriptor.arg, next)?;
                    }
                }
                state = next;

                let child = self.oracle.spawn_worker(&candidate)?;
                inflight.push_back(Variant {
                    pid: Some(Pid::from_raw(child.id() as i32)),
                    pre_state,
                    dir,
                    candidate,
                    result: None,
                });
            }

            // Consume verdicts in submission order.
            loop {
                match inflight.front() {
                    Some(variant) if variant.pid.is_none() => {}
                    _ => break,
                }
                let Some(variant) = inflight.pop_front() else {
                    break;
                };
                if variant.result.unwrap_or(false) {
                    good += 1;
                    since_success = 0;
                    stats.record_worked(descriptor);
                    for observer in self.observers {
                        observer.accepted(best, &variant.candidate);
                    }
                    std::fs::copy(&variant.candidate, best)
                        .with_context(|| format!("installing accepted candidate for {label}"))?;
                    // Rewind: later speculation assumed this candidate would
                    // be rejected.
                    state = variant.pre_state;
                    stopped = false;
                    self.cancel_all(inflight);
                    self.scratch.release(&variant.dir);
                    trace!(target: "delta.loop", pass = %label, good, "candidate_accepted");
                } else {
                    bad += 1;
                    since_success += 1;
                    stats.record_failed(descriptor);
                    self.scratch.release(&variant.dir);
                    trace!(target: "delta.loop", pass = %label, bad, "candidate_rejected");
                }
            }

            // Block for one verdict if anything is still running.
            if !inflight.is_empty() {
                match waitpid(None::<Pid>, None) {
                    Ok(WaitStatus::Exited(pid, code)) => {
                        self.settle(inflight, pid, code == 0);
                    }
                    Ok(WaitStatus::Signaled(pid, _, _)) => {
                        // A crashed worker is just a rejected candidate.
                        self.settle(inflight, pid, false);
                    }
                    Ok(_) => {}
                    Err(Errno::EINTR) => {
                        // Signal arrived; the loop head re-checks the flag.
                    }
                    Err(Errno::ECHILD) => {
                        bail!("lost track of worker processes for {label}");
                    }
                    Err(errno) => {
                        return Err(errno).with_context(|| format!("waiting on workers for {label}"));
                    }
                }
            }

            if let Some(limit) = self.options.giveup_after
                && since_success > limit
            {
                warn!(target: "delta.loop", pass = %label, since_success, "pass_abandoned");
                self.cancel_all(inflight);
                return Ok(DeltaOutcome {
                    exit: LoopExit::GaveUp,
                    good,
                    bad,
                });
            }

            if stopped && inflight.is_empty() {
                info!(target: "delta.loop", pass = %label, good, bad, "pass_finished");
                return Ok(DeltaOutcome {
                    exit: LoopExit::Exhausted,
                    good,
                    bad,
                });
            }
        }
    }

    /// Record a reaped worker's verdict on its variant. Unknown pids can
    /// surface after a cancellation race; they carry no verdict we want.
    fn settle(&self, inflight: &mut VecDeque<Variant>, pid: Pid, interesting: bool) {
        match inflight
            .iter_mut()
            .find(|v| v.pid == Some(pid))
        {
            Some(variant) => {
                variant.pid = None;
                variant.result = Some(interesting);
            }
            None => debug!(target: "delta.loop", pid = pid.as_raw(), "stray_child_reaped"),
        }
    }

    /// Kill and reap every remaining worker, releasing its scratch dir. Used
    /// on acceptance (later speculation is invalid), give-up, and interrupt.
    fn cancel_all(&self, inflight: &mut VecDeque<Variant>) {
        for variant in inflight.drain(..) {
            if let Some(pid) = variant.pid {
                core_lifecycle::terminate_group(pid);
                loop {
                    match waitpid(pid, None) {
                        Ok(WaitStatus::StillAlive) => {}
                        Ok(_) => break,
                        Err(Errno::EINTR) => {}
                        Err(_) => break,
                    }
                }
            }
            self.scratch.release(&variant.dir);
        }
    }
}
