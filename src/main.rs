//! CLI entrypoint for `passhealth`.
//!
//! Parses command-line arguments, validates input files, loads cracked output
//! (and optional NTDS dumps) through the library engine, prints breach
//! notices and a summary, and optionally writes CSV exports when an output
//! directory is provided.
use std::fs;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::{LevelFilter, error, info, warn};
use passhealth::{
    config::{AuditConfig, DEFAULT_MIN_LENGTH},
    engine::Engine,
    export::{save_breaches_csv, save_metrics_csv},
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    report::Reporter,
};

#[derive(Parser, Debug)]
#[command(
    name = "passhealth-rs",
    version,
    about = "Password policy and hash hygiene auditor (Rust)"
)]
struct Args {
    /// Output from John using --show, in the format
    /// DOMAIN\user:password:RID:LMHash:NTLMHash::: (pwdLastSet) (status).
    /// The pwdLastSet and status parts are optional.
    #[arg(short = 'J', long = "john", required = true)]
    john: Vec<PathBuf>,

    /// NTDS dump file(s) (user:RID:LMHash:NTLMHash:::). When given, metrics
    /// cover every dumped account instead of only the cracked ones.
    #[arg(short = 'd', long = "ditfiles")]
    ditfiles: Vec<PathBuf>,

    /// Flag every cracked password shorter than this many characters
    #[arg(short = 'N', long = "number", default_value_t = DEFAULT_MIN_LENGTH)]
    min_length: usize,

    /// Show plaintext passwords in console and CSV output
    #[arg(long = "reveal")]
    reveal: bool,

    /// Include machine accounts in results. This also adds them to the
    /// metrics population (the "machine" bucket and the Grand Total).
    #[arg(long = "machine")]
    machine: bool,

    /// Disable the calculation of password hash metrics
    #[arg(long = "no-metrics")]
    no_metrics: bool,

    /// Path to the output directory
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Override mmap threshold in bytes. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Increase verbosity (-v prints per-domain metrics, -vv adds debug logs)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Aggregate metrics in parallel
    #[arg(long = "parallel")]
    parallel: bool,

    /// Log counts of skipped/filtered lines encountered during parsing.
    /// Raises the log level to at least info.
    #[arg(long = "log-parse-stats")]
    log_parse_stats: bool,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress console output (still writes exports if -o is provided)
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

const ASCII_TITLE: &str = r#"
 ___              _  _          _ _   _
| _ \__ _ ______ | || |___ __ _| | |_| |_
|  _/ _` (_-<_-< | __ / -_) _` | |  _| ' \
|_| \__,_/__/__/ |_||_\___\__,_|_|\__|_||_|
"#;

fn init_logger(verbosity: u8, parse_stats: bool) {
    let level = match verbosity {
        0 if parse_stats => LevelFilter::Info,
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn verify_inputs(args: &Args) -> Result<()> {
    if args.john.is_empty() {
        bail!("no John output provided (-J/--john)");
    }
    for p in &args.john {
        if !p.exists() {
            bail!("John output not found: {}", p.display());
        }
    }
    for p in &args.ditfiles {
        if !p.exists() {
            bail!("DIT file not found: {}", p.display());
        }
    }
    if args.no_metrics && !args.ditfiles.is_empty() {
        warn!("--no-metrics set; DIT files will be ignored");
    }
    Ok(())
}

fn config_from_args(args: &Args) -> AuditConfig {
    AuditConfig::default()
        .with_min_length(args.min_length)
        .with_reveal_passwords(args.reveal)
        .with_include_machine(args.machine)
        .with_verbose(args.verbose > 0)
        .with_metrics(!args.no_metrics)
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose, args.log_parse_stats);
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }
    if let Err(e) = verify_inputs(&args) {
        error!("{}", e);
        std::process::exit(2);
    }
    let config = config_from_args(&args);
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };

    let mut engine = match Engine::new(config.clone()) {
        Ok(e) => e,
        Err(e) => {
            error!("failed to initialise policy: {:#}", e);
            std::process::exit(3);
        }
    };
    if let Err(e) = engine.load_from_file_paths_with_threshold(&args.john, &args.ditfiles, threshold)
    {
        error!("failed to load inputs: {:#}", e);
        std::process::exit(3);
    }

    let verdicts = engine.evaluate();
    let metrics = if !config.metrics {
        None
    } else if engine.records.is_empty() {
        warn!("no account records loaded; skipping metrics");
        None
    } else if args.parallel {
        Some(engine.metrics_parallel())
    } else {
        Some(engine.metrics())
    };
    let metrics = metrics.filter(|m| {
        if m.is_empty() {
            warn!("every account record was filtered out; skipping metrics");
        }
        !m.is_empty()
    });

    if !args.quiet {
        println!("{}", ASCII_TITLE.bold().green());
        match Reporter::new(&config).render_summary(&engine, &verdicts, metrics.as_ref()) {
            Ok(summary) => println!("{}", summary),
            Err(e) => {
                error!("failed to compute metrics: {}", e);
                std::process::exit(6);
            }
        }
    }

    if let Some(outdir) = args.output {
        if let Err(e) = fs::create_dir_all(&outdir) {
            error!(
                "failed to create output directory {}: {}",
                outdir.display(),
                e
            );
            std::process::exit(4);
        }
        let ts = chrono::Local::now().format("%Y.%m.%d_%H.%M.%S");
        let breaches = outdir.join(format!("passhealth_breaches_{}.csv", ts));
        if let Err(e) = save_breaches_csv(&verdicts, &breaches) {
            error!("failed to write {}: {:#}", breaches.display(), e);
            std::process::exit(5);
        }
        info!("breach list saved to {}", breaches.display());
        if let Some(report) = &metrics {
            let path = outdir.join(format!("passhealth_metrics_{}.csv", ts));
            if let Err(e) = save_metrics_csv(report, &path) {
                error!("failed to write {}: {:#}", path.display(), e);
                std::process::exit(5);
            }
            info!("metrics saved to {}", path.display());
        }
    }

    if args.log_parse_stats {
        let stats = engine.parse_stats;
        info!(
            "parse stats: cracked_lines={}, dit_lines={}, skipped={}, machine_filtered={}, cracked_matched={}",
            stats.cracked_lines,
            stats.dit_lines,
            stats.skipped_lines,
            stats.machine_filtered,
            stats.cracked_matched
        );
    }
}
