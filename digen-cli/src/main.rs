//! `digen`: generates dependency injection containers from a struct declaration.
//!
//! ```bash
//! # Write digen.yaml and the declaration skeleton
//! digen init --dir src/di
//!
//! # Regenerate the container after editing the declaration
//! digen generate
//!
//! # Show what would be written
//! digen --dry-run generate
//! ```

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use digen::{BuildInfo, DryRunSink, FsSink, Generator, Sink};
use std::{
    io::{self, BufRead as _, Write as _},
    path::PathBuf,
    process::ExitCode,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIR: &str = "src/di";

#[derive(Parser)]
#[command(name = "digen", author, version, about = "Dependency injection container generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Project root holding the config file
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Print the files that would be written instead of writing them
    #[arg(long, global = true)]
    dry_run: bool,

    /// More logs, repeat for trace level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Write the config, the declaration skeleton and a README
    Init {
        /// Container directory, relative to the root. Asked for when missing.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Generate the container from its declaration
    Generate,
    /// Print the version and build time
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Version = cli.command {
        let BuildInfo { version, built } = BuildInfo::CURRENT;
        println!("digen v{version} (built {built})");
        return Ok(());
    }

    if cli.dry_run {
        let generator = Generator::new(&cli.root, DryRunSink::new());
        execute(&generator, cli.command)?;
        for path in generator.into_sink().paths() {
            println!("{}", path.display());
        }
        Ok(())
    } else {
        execute(&Generator::new(&cli.root, FsSink), cli.command)
    }
}

fn execute<S: Sink>(generator: &Generator<S>, command: Command) -> Result<()> {
    match command {
        Command::Init { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => prompt_dir()?,
            };
            let written = generator.init(&dir).context("init failed")?;
            debug!(files = written.len(), "Init done");
        }
        Command::Generate => {
            let generated = generator.generate().context("generate failed")?;
            if !generated.failed_stubs.is_empty() {
                eprintln!("Factory stubs not written for: {}", generated.failed_stubs.join(", "));
            }
        }
        Command::Version => {}
    }
    Ok(())
}

fn prompt_dir() -> Result<PathBuf> {
    print!("Container directory [{DEFAULT_DIR}]: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("read container directory")?;

    let line = line.trim();
    Ok(PathBuf::from(if line.is_empty() { DEFAULT_DIR } else { line }))
}
