//! Human-facing progress reporting, hung off the delta loop's accept hook.

use core_delta::AcceptObserver;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Report how far below the original size the artifact has come.
pub fn print_pct(orig_size: u64, size: u64) {
    let pct = if orig_size == 0 {
        0.0
    } else {
        100.0 * (1.0 - size as f64 / orig_size as f64)
    };
    println!("({pct:.1} %, {size} bytes)");
}

/// Prints a progress line for every accepted candidate.
pub struct ProgressPrinter {
    orig_size: u64,
}

impl ProgressPrinter {
    pub fn new(orig_size: u64) -> Self {
        Self { orig_size }
    }
}

impl AcceptObserver for ProgressPrinter {
    fn accepted(&self, _best: &Path, candidate: &Path) {
        match candidate.metadata() {
            Ok(meta) => print_pct(self.orig_size, meta.len()),
            Err(err) => debug!(target: "driver.progress", %err, "size_unavailable"),
        }
    }
}

/// Shows each accepted reduction as a unified diff against the outgoing best.
/// Exit status is ignored: `diff` signals "files differ" through it, and a
/// missing `diff` binary only costs the printout.
pub struct DiffPrinter;

impl AcceptObserver for DiffPrinter {
    fn accepted(&self, best: &Path, candidate: &Path) {
        match Command::new("diff").arg("-u").arg(best).arg(candidate).status() {
            Ok(_) => {}
            Err(err) => debug!(target: "driver.progress", %err, "diff_unavailable"),
        }
    }
}
