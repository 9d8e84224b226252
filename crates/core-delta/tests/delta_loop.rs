//! End-to-end delta-loop scenarios against real `/bin/sh` oracles.

use core_delta::{AcceptObserver, DeltaLoop, DeltaOptions, LoopExit, RunStats};
use core_oracle::Oracle;
use core_pass::{Pass, PassDescriptor, RegisteredPass};
use core_reducers::{CharsPass, LinePass};
use core_scratch::ScratchSpace;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// The loop reaps with waitpid(-1); two loops in one test process would steal
// each other's workers. Serialize every scenario.
static SERIAL: Mutex<()> = Mutex::new(());

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn entry(name: &str, arg: &str, pass: Arc<dyn Pass>) -> RegisteredPass {
    RegisteredPass {
        descriptor: PassDescriptor::new(name, arg),
        pass,
    }
}

fn options(workers: usize, giveup_after: Option<u64>) -> DeltaOptions {
    DeltaOptions {
        workers,
        fuzz: false,
        giveup_after,
    }
}

fn run_pass(
    oracle_body: &str,
    input: &[u8],
    entry_pass: &RegisteredPass,
    opts: &DeltaOptions,
) -> (Vec<u8>, core_delta::DeltaOutcome, RunStats) {
    let tmp = tempfile::tempdir().unwrap();
    let script = write_script(tmp.path(), "oracle.sh", oracle_body);
    let best = tmp.path().join("input.c.best");
    fs::write(&best, input).unwrap();

    let oracle = Oracle::new(&script, false).unwrap();
    let scratch = ScratchSpace::new(false);
    let observers: Vec<Box<dyn AcceptObserver>> = Vec::new();
    let delta = DeltaLoop::new(
        &oracle,
        &scratch,
        opts,
        &observers,
        OsStr::new("input.c"),
    );

    let mut stats = RunStats::new();
    let outcome = delta.run(entry_pass, &best, &mut stats).unwrap();
    assert_eq!(scratch.tracked(), 0, "no scratch dir may leak");
    (fs::read(&best).unwrap(), outcome, stats)
}

#[test]
fn identity_oracle_empties_the_file() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    // Accepts anything, but proves candidates keep the canonical file name.
    let oracle = "#!/bin/sh\n[ \"$(basename \"$1\")\" = \"input.c\" ]\n";
    let entry = entry("lines", "1", Arc::new(LinePass));
    let (best, outcome, stats) =
        run_pass(oracle, b"a\nb\nc\nd\n", &entry, &options(4, None));

    assert_eq!(best, b"");
    assert_eq!(outcome.exit, LoopExit::Exhausted);
    assert!(outcome.good >= 1);
    assert_eq!(stats.worked("lines", "1"), outcome.good);
}

#[test]
fn byte_pass_isolates_the_interesting_byte() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let oracle = "#!/bin/sh\ngrep -q Q \"$1\"\n";
    let entry = entry("chars", "1", Arc::new(CharsPass));
    let (best, outcome, _) =
        run_pass(oracle, b"ABQCDE", &entry, &options(1, None));

    assert_eq!(best, b"Q");
    assert_eq!(outcome.exit, LoopExit::Exhausted);
}

#[test]
fn parallel_run_matches_sequential_result() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let oracle = "#!/bin/sh\ngrep -q Q \"$1\"\n";

    let sequential = {
        let entry = entry("chars", "1", Arc::new(CharsPass));
        run_pass(oracle, b"ABQCDE", &entry, &options(1, None)).0
    };
    let parallel = {
        let entry = entry("chars", "1", Arc::new(CharsPass));
        run_pass(oracle, b"ABQCDE", &entry, &options(4, None)).0
    };

    assert_eq!(parallel, sequential);
    assert_eq!(parallel, b"Q");
}

#[test]
fn rejecting_oracle_exhausts_without_touching_best() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let oracle = "#!/bin/sh\nexit 1\n";
    let entry = entry("lines", "1", Arc::new(LinePass));
    let input = b"a\nb\n";
    let (best, outcome, stats) = run_pass(oracle, input, &entry, &options(2, None));

    assert_eq!(best, input);
    assert_eq!(outcome.exit, LoopExit::Exhausted);
    assert_eq!(outcome.good, 0);
    assert!(outcome.bad > 0);
    assert_eq!(stats.failed("lines", "1"), outcome.bad);
}

#[test]
fn give_up_heuristic_abandons_barren_passes() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let oracle = "#!/bin/sh\nexit 1\n";
    let entry = entry("chars", "1", Arc::new(CharsPass));
    let input = b"abcdefghijklmnopqrstuvwxyz";
    let (best, outcome, _) = run_pass(oracle, input, &entry, &options(2, Some(3)));

    assert_eq!(best, input);
    assert_eq!(outcome.exit, LoopExit::GaveUp);
    assert!(outcome.bad >= 4, "must see since_success exceed the budget");
}

#[test]
fn crashing_oracle_counts_as_rejection() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    // Accept only when Q survives; otherwise die with an ugly status.
    let oracle = "#!/bin/sh\ngrep -q Q \"$1\" && exit 0\nkill -s SEGV $$ || exit 139\n";
    let entry = entry("chars", "1", Arc::new(CharsPass));
    let (best, outcome, _) = run_pass(oracle, b"XQ", &entry, &options(1, None));

    assert_eq!(best, b"Q");
    assert_eq!(outcome.exit, LoopExit::Exhausted);
}

#[test]
fn fuzz_walk_still_terminates_and_reduces() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let oracle = "#!/bin/sh\nexit 0\n";
    let entry = entry("lines", "1", Arc::new(LinePass));
    let opts = DeltaOptions {
        workers: 2,
        fuzz: true,
        giveup_after: None,
    };
    // Whatever the coin does, the head-of-line candidate deletes everything
    // and is accepted; the rewound cursor then sees an empty file and stops.
    let (best, outcome, _) = run_pass(oracle, b"a\nb\nc\n", &entry, &opts);
    assert_eq!(best, b"");
    assert_eq!(outcome.exit, LoopExit::Exhausted);
}

#[test]
fn accept_observers_see_old_best_and_candidate() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());

    struct Recorder {
        seen: Arc<Mutex<Vec<(Vec<u8>, Vec<u8>)>>>,
    }
    impl AcceptObserver for Recorder {
        fn accepted(&self, best: &Path, candidate: &Path) {
            self.seen
                .lock()
                .unwrap()
                .push((fs::read(best).unwrap(), fs::read(candidate).unwrap()));
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let script = write_script(tmp.path(), "oracle.sh", "#!/bin/sh\nexit 0\n");
    let best = tmp.path().join("input.c.best");
    fs::write(&best, b"a\nb\n").unwrap();

    let oracle = Oracle::new(&script, false).unwrap();
    let scratch = ScratchSpace::new(false);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observers: Vec<Box<dyn AcceptObserver>> =
        vec![Box::new(Recorder { seen: seen.clone() })];

    let opts = options(1, None);
    let delta = DeltaLoop::new(&oracle, &scratch, &opts, &observers, OsStr::new("input.c"));
    let entry = entry("lines", "1", Arc::new(LinePass));
    let mut stats = RunStats::new();
    let outcome = delta.run(&entry, &best, &mut stats).unwrap();

    assert_eq!(outcome.exit, LoopExit::Exhausted);
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    // First acceptance: old best intact, candidate already reduced.
    let (old, new) = &seen[0];
    assert_eq!(old, b"a\nb\n");
    assert!(new.len() < old.len());
}
