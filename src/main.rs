use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xmltv_augment::{
    config::Config,
    document::Document,
    errors::{NoInputError, UpdateError},
    pipeline::{canonicalize, Engine},
    stages, update,
};

const EXIT_NO_INPUT: u8 = 2;
const EXIT_UPDATE_UNREACHABLE: u8 = 3;
const EXIT_UPDATE_UNPARSABLE: u8 = 4;
const EXIT_UPGRADE_REQUIRED: u8 = 5;

#[derive(Parser)]
#[command(name = "xmltv-augment")]
#[command(version)]
#[command(about = "Batch post-processor for XMLTV listings documents")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable informational logging
    #[arg(short, long)]
    verbose: bool,

    /// Listings file to process; read from standard input when piped
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging at the level implied by the CLI flags. Logging goes
    // to stderr; stdout carries only the processed document.
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let log_filter = format!("xmltv_augment={}", level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;

    if config.update.enabled {
        match update::check(&config) {
            Ok(update::UpdateStatus::UpToDate) => {}
            Ok(update::UpdateStatus::UpgradeAvailable { latest }) => {
                warn!(
                    "a newer version ({}) is available; this is {}",
                    latest,
                    env!("CARGO_PKG_VERSION")
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    let input = read_input(cli)?;
    let mut document = Document::parse(&input)?;
    info!("loaded listings document with {} entries", document.entry_count());

    let mut engine = Engine::new(stages::build(&config));
    engine.run(&mut document);

    canonicalize(&mut document)?;
    let output = document.to_xml()?;
    io::stdout()
        .write_all(output.as_bytes())
        .context("writing output")?;

    Ok(())
}

fn read_input(cli: &Cli) -> Result<String> {
    match &cli.file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut stdin = io::stdin();
            if stdin.is_terminal() {
                return Err(NoInputError.into());
            }
            let mut buffer = String::new();
            stdin
                .read_to_string(&mut buffer)
                .context("reading standard input")?;
            Ok(buffer)
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.is::<NoInputError>() {
        return EXIT_NO_INPUT;
    }
    match err.downcast_ref::<UpdateError>() {
        Some(UpdateError::Unreachable { .. }) => EXIT_UPDATE_UNREACHABLE,
        Some(UpdateError::Unparsable { .. }) => EXIT_UPDATE_UNPARSABLE,
        Some(UpdateError::UpgradeRequired { .. }) => EXIT_UPGRADE_REQUIRED,
        None => 1,
    }
}
