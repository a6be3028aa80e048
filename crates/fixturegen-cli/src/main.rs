use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fixturegen_config::{load_config, load_definitions, ConfigError};
use fixturegen_generate::output::write_dataset;
use fixturegen_generate::{EngineOptions, FixtureEngine, GenerationError};

#[derive(Debug, Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "fixturegen", version, about = "Referentially consistent fixture datasets")]
struct Cli {
    /// Directory holding one YAML model per entity type.
    #[arg(long, default_value = "models")]
    models: PathBuf,
    /// Run configuration file (languages, seed, row counts).
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,
    /// Output directory for the generated dataset.
    #[arg(long, default_value = "generated")]
    out: PathBuf,
    /// Override the configured seed.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match generate(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "generation aborted");
            ExitCode::FAILURE
        }
    }
}

fn generate(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config(&cli.config)?;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    let definitions = load_definitions(&cli.models)?;

    let engine = FixtureEngine::new(EngineOptions::default());
    let outcome = engine.run(&definitions, &config)?;

    fs::create_dir_all(&cli.out)?;
    let bytes_written = write_dataset(&outcome.dataset, &definitions, &cli.out)?;
    let report_path = cli.out.join("generation_report.json");
    fs::write(&report_path, serde_json::to_vec_pretty(&outcome.report)?)?;

    info!(
        out = %cli.out.display(),
        entities = outcome.report.entities.len(),
        bytes_written,
        duration_ms = outcome.report.duration_ms,
        "dataset written"
    );
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
