// Jailpack - Main Entry Point
//
// Command surface for:
// - build: package an application directory into a Cage
// - run: extract a Cage into a jail root and start the jail
// - list: show running jails

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jailpack::config::{Config, ExtractorKind};
use jailpack::host::{JailCommand, JlsCommand};
use jailpack::runner::jail_root_for;
use jailpack::{build_cage, list_jails, CageRunner, RunRequest};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// Jailpack: portable application Cages for FreeBSD jails
#[derive(Parser, Debug)]
#[command(name = "jailpack")]
#[command(author = "Jailpack Contributors")]
#[command(version)]
#[command(about = "A tool for jail management", long_about = "Jailpack packages applications into portable Cages and runs them as FreeBSD jails")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create Cage from application
    ///
    /// Packages application into portable .cage.tar.gz
    Build {
        /// Application directory
        path: PathBuf,

        /// Cage archive name
        #[arg(short, long, default_value = jailpack::cage::DEFAULT_CAGE_NAME)]
        output: PathBuf,
    },
    /// Run Cage
    ///
    /// Extracts and runs jail from .cage.tar.gz
    Run {
        /// Cage archive
        cage: PathBuf,

        /// Jail name [default: cage-app]
        #[arg(long)]
        name: Option<String>,

        /// Jail IP address [default: 10.0.0.10]
        #[arg(long)]
        ip: Option<String>,

        /// Extraction backend (overrides the configuration)
        #[arg(long, value_enum)]
        extractor: Option<ExtractorKind>,
    },
    /// List running jails
    List,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.config.as_deref() {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config, args.verbose);

    match dispatch(args.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing on stderr so stdout only carries command output
fn init_tracing(config: &Config, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level().unwrap_or(Level::INFO)
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
}

fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Build { path, output } => build(path, output, config),
        Commands::Run {
            cage,
            name,
            ip,
            extractor,
        } => run(cage, name, ip, extractor, config),
        Commands::List => {
            list(config);
            Ok(())
        }
    }
}

fn build(path: PathBuf, output: PathBuf, config: &Config) -> Result<()> {
    println!("Building Cage from: {}", path.display());
    let summary =
        build_cage(&path, &output, &config.build_options()).context("build error")?;
    debug!(
        "{} entries, {} application files",
        summary.entries, summary.payload_files
    );
    println!("Cage created: {}", summary.target.display());
    Ok(())
}

fn run(
    cage: PathBuf,
    name: Option<String>,
    ip: Option<String>,
    extractor: Option<ExtractorKind>,
    config: &Config,
) -> Result<()> {
    let name = name.unwrap_or_else(|| config.run.default_name.clone());
    let ip = ip.unwrap_or_else(|| config.run.default_ip.clone());
    let jail_root = jail_root_for(&config.run.jails_dir, &name);

    let request = RunRequest::new(&cage, &jail_root, &name, &ip)
        .with_devfs_ruleset(config.run.devfs_ruleset);
    request.validate().context("run error")?;

    let runner = CageRunner::new(
        config.extractor(extractor.unwrap_or(config.run.extractor)),
        JailCommand::new(&config.host.jail),
    );

    println!("Extracting Cage: {} → {}", cage.display(), jail_root.display());
    runner.run(&request).context("run error")?;

    println!("Cage '{}' successfully started", name);
    Ok(())
}

fn list(config: &Config) {
    println!("Running jails:");
    match list_jails(&JlsCommand::new(&config.host.jls)) {
        Ok(listing) => print!("{}", listing),
        Err(e) => println!("Error listing jails: {}", e),
    }
}
