//! Whittle entrypoint.
use anyhow::Result;
use clap::Parser;
use core_driver::{Driver, DriverOptions};
use core_pass::Registry;
use core_reducers::{CatalogOptions, builtin_registry};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// Give-up budget applied when neither the command line nor the config file
/// says otherwise.
const GIVE_UP_DEFAULT: u64 = 500;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "whittle", version, about = "Delta-debugging artifact reducer")]
struct Args {
    /// Interestingness oracle: an executable invoked as `oracle <candidate>`
    /// that exits 0 iff the candidate is still interesting.
    pub oracle: PathBuf,
    /// The artifact to reduce. Rewritten in place on success; pristine copy
    /// kept beside it as `<name>.orig`.
    pub artifact: PathBuf,
    /// Preprocessor command, run once at the head of the main phase to
    /// rewrite the artifact in place (e.g. expand includes).
    #[arg(long = "cpp", value_name = "CMD")]
    pub cpp: Option<String>,
    /// Randomize the search walk.
    #[arg(long)]
    pub fuzz: bool,
    /// Parallel oracle workers.
    #[arg(short = 'n', value_name = "N")]
    pub workers: Option<usize>,
    /// Start from an empty pass catalog.
    #[arg(long = "no-default-passes")]
    pub no_default_passes: bool,
    /// Never abandon a pass, however barren.
    #[arg(long = "no-give-up")]
    pub no_give_up: bool,
    /// Show each accepted reduction as a unified diff.
    #[arg(long = "print-diff")]
    pub print_diff: bool,
    /// Add the byte-canonicalization passes.
    #[arg(long)]
    pub sanitize: bool,
    /// Re-verify the best artifact before every pass.
    #[arg(long = "sanity-checks")]
    pub sanity_checks: bool,
    /// Keep all scratch directories.
    #[arg(long = "save-temps")]
    pub save_temps: bool,
    /// Jump straight to the main phase.
    #[arg(long = "skip-initial-passes")]
    pub skip_initial_passes: bool,
    /// Add the slower token-window passes.
    #[arg(long)]
    pub slow: bool,
    /// Add the slowest token- and byte-window passes.
    #[arg(long = "sllooww")]
    pub very_slow: bool,
    /// Pass oracle and preprocessor output through.
    #[arg(long)]
    pub verbose: bool,
    /// Reserved.
    #[arg(long, hide = true)]
    pub cache: bool,
    /// Configuration file path (overrides discovery of `whittle.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("whittle.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "whittle.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Some(guard),
        Err(_err) => {
            // Global tracing subscriber already installed; drop guard so writer shuts down.
            None
        }
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

/// Fold the config file under the command line: flags win, the file fills
/// gaps, hard defaults fill the rest.
fn resolve_options(args: &Args, config: &core_config::Config) -> DriverOptions {
    let reduce = &config.file.reduce;
    let defaults = DriverOptions::default();
    DriverOptions {
        workers: args.workers.or(reduce.workers).unwrap_or(defaults.workers),
        preprocess_cmd: args.cpp.clone(),
        fuzz: args.fuzz,
        sanity_check_each_pass: args.sanity_checks,
        skip_initial: args.skip_initial_passes,
        print_diff: args.print_diff,
        save_temps: args.save_temps || reduce.save_temps.unwrap_or(false),
        cache: args.cache,
        verbose: args.verbose || reduce.verbose.unwrap_or(false),
        giveup_after: if args.no_give_up {
            None
        } else {
            Some(reduce.give_up_after.unwrap_or(GIVE_UP_DEFAULT))
        },
    }
}

fn resolve_registry(args: &Args) -> Registry {
    builtin_registry(CatalogOptions {
        sanitize: args.sanitize,
        slow: args.slow,
        very_slow: args.very_slow,
        no_defaults: args.no_default_passes,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();
    core_lifecycle::install()?;

    let config = core_config::load_from(args.config.clone())?;
    let options = resolve_options(&args, &config);
    let registry = resolve_registry(&args);

    info!(
        target: "runtime",
        oracle = %args.oracle.display(),
        artifact = %args.artifact.display(),
        workers = options.workers,
        passes = registry.len(),
        "startup"
    );

    let driver = Driver::new(options, registry, &args.oracle, &args.artifact)?;
    let report = driver.run()?;
    info!(
        target: "runtime",
        final_size = report.final_size,
        "shutdown"
    );
    Ok(())
}
