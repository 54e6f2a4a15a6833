// Command line front end
// Argument parsing, logging setup and the get/check/list commands

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use checksum::hash::{
    collect_with, ChecksumEngine, ChecksumResult, Config, HashRegistry, LogConfig, LogFormat, Report,
    VerifyEngine,
};

#[derive(Debug, Parser)]
#[command(name = "checksum", version, about = "Get the checksum of a file, files, or directory")]
pub struct Cli {
    /// Config file (default: <config dir>/checksum/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Get the checksum of a file or files
    Get(GetArgs),
    /// Check local files against a checksum report and list the differences
    Check(CheckArgs),
    /// List all the hashes that can be used
    List {
        /// Print algorithm details as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct GetArgs {
    /// Get the checksum of folders and files recursively
    #[arg(short, long)]
    recursive: bool,

    /// The output file of the checksum(s) (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Concurrent files per source (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,

    /// The hash to use for the checksum
    hash: String,

    /// File(s) or directory to get the checksum of
    #[arg(required = true)]
    srcs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Compare the checksum of folders and files recursively
    #[arg(short, long)]
    recursive: bool,

    /// Concurrent files per source (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,

    /// The checksum file to check your files against
    checksum_file: PathBuf,

    /// The files to check against the checksum file (default: every file it lists)
    srcs: Vec<PathBuf>,
}

pub fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load_or_default(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config.log, cli.verbose);

    let registry = HashRegistry::standard();
    match cli.command {
        Command::Get(args) => {
            let engine = build_engine(registry, &config, args.workers);
            get_command(&engine, &args)
        }
        Command::Check(args) => {
            let engine = build_engine(registry, &config, args.workers);
            check_command(&engine, &args)
        }
        Command::List { json } => list_command(&registry, json),
    }
}

fn build_engine(registry: HashRegistry, config: &Config, workers: Option<usize>) -> ChecksumEngine {
    let engine = ChecksumEngine::new(registry).with_config(config.engine.clone());
    match workers {
        Some(workers) => engine.with_workers(workers),
        None => engine,
    }
}

fn init_logging(log: &LogConfig, verbose: u8) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = match verbose {
        0 => log.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Reports may go to stdout, so logs always go to stderr
    let installed = match log.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr))
            .try_init(),
    };
    if let Err(e) = installed {
        eprintln!("Warning: could not install logger: {}", e);
    }
}

fn get_command(engine: &ChecksumEngine, args: &GetArgs) -> Result<ExitCode> {
    validate_sources(args.recursive, &args.srcs)?;
    ensure_supported(engine, &args.hash)?;

    info!(hash = %args.hash, sources = args.srcs.len(), workers = engine.config().workers, "starting");
    let spinner = spinner();
    let stream = engine.checksum_many(&args.srcs, &args.hash);
    let collected = collect_with(stream, |result| {
        spinner.inc(1);
        if let ChecksumResult::Error(error) = result {
            spinner.suspend(|| eprintln!("{} {}", "error:".red().bold(), error));
        }
    });
    spinner.finish_and_clear();

    let clean = collected.is_clean();
    let (files, errors) = (collected.checksums.len(), collected.errors.len());
    let report = collected.into_report(&args.hash);

    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating output file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            report
                .write_to(&mut writer)
                .with_context(|| format!("writing output file {}", path.display()))?;
            eprintln!("Output written to: {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            report.write_to(&mut writer).context("writing report to stdout")?;
        }
    }

    info!(files, errors, "done");
    if clean {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "{} could not get the checksum of all the files ({} failed)",
            "warning:".yellow().bold(),
            errors
        );
        Ok(ExitCode::FAILURE)
    }
}

fn check_command(engine: &ChecksumEngine, args: &CheckArgs) -> Result<ExitCode> {
    // The checksum file has to exist too
    let mut to_validate = args.srcs.clone();
    to_validate.push(args.checksum_file.clone());
    validate_sources(args.recursive, &to_validate)?;

    let report = Report::load(&args.checksum_file)
        .with_context(|| format!("reading checksum file {}", args.checksum_file.display()))?;
    ensure_supported(engine, &report.algorithm)?;

    info!(
        report = %args.checksum_file.display(),
        hash = %report.algorithm,
        sources = args.srcs.len(),
        recursive = args.recursive,
        "checking"
    );
    let outcome = VerifyEngine::new(engine).verify(&report, &args.srcs);
    outcome.display();

    Ok(if outcome.has_issues() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn list_command(registry: &HashRegistry, json: bool) -> Result<ExitCode> {
    let algorithms = registry.list_algorithms();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        serde_json::to_writer_pretty(&mut out, &algorithms).context("encoding algorithm list")?;
        writeln!(out)?;
    } else {
        for info in &algorithms {
            let mut line = format!("* {} ({} bits)", info.name.to_lowercase(), info.output_bits);
            if !info.cryptographic {
                line.push_str(" non-cryptographic");
            }
            writeln!(out, "{}", line)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn ensure_supported(engine: &ChecksumEngine, hash: &str) -> Result<()> {
    if !engine.registry().contains(hash) {
        bail!("the hash provided is not supported: {} (run `checksum list`)", hash);
    }
    Ok(())
}

/// Every source must exist, and directories need the recursive flag
fn validate_sources(recursive: bool, srcs: &[PathBuf]) -> Result<()> {
    for src in srcs {
        validate_source(recursive, src)?;
    }
    Ok(())
}

fn validate_source(recursive: bool, src: &Path) -> Result<()> {
    match src.metadata() {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            bail!("{}: file not found", src.display())
        }
        Err(e) => Err(e).with_context(|| format!("{}: something went wrong", src.display())),
        Ok(metadata) if metadata.is_dir() && !recursive => {
            bail!(
                "{}: must include --recursive to get/check the checksum of files inside a folder",
                src.display()
            )
        }
        Ok(_) => Ok(()),
    }
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {pos} files hashed")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
