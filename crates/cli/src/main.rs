// cohort CLI - cancellation reconciliation over retail transaction ledgers.

mod exit_codes;
mod export;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cohort_recon::config::ReconConfig;
use cohort_recon::error::ReconError;
use cohort_recon::{engine, ingest, report};

use exit_codes::{EXIT_INTEGRITY, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Reconcile retail cancellations against prior purchases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  cohort run ledger.toml
  cohort run ledger.toml --json
  cohort run ledger.toml --output result.json --annotated net.csv
  cohort run ledger.toml --limit 500")]
    Run {
        /// Path to the config file
        config: PathBuf,

        /// Output JSON to stdout instead of the human summary
        #[arg(long)]
        json: bool,

        /// Write the JSON result to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the annotated ledger as CSV
        #[arg(long)]
        annotated: Option<PathBuf>,

        /// Process at most N cancellation records (overrides config)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Validate a config file without running
    #[command(after_help = "\
Examples:
  cohort validate ledger.toml")]
    Validate {
        /// Path to the config file
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config, json, output, annotated, limit } => {
            cmd_run(config, json, output, annotated, limit)
        }
        Commands::Validate { config } => cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Map an engine error to its exit code.
    fn from_recon(err: ReconError) -> Self {
        let code = match &err {
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
            ReconError::IntegrityViolation { .. } => EXIT_INTEGRITY,
            _ => EXIT_RUNTIME,
        };
        Self::new(code, err.to_string())
    }
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| CliError::new(EXIT_USAGE, format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(CliError::from_recon)
}

fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    annotated_file: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<(), CliError> {
    let mut config = load_config(&config_path)?;
    if limit.is_some() {
        config.policy.limit = limit;
    }

    // Resolve file paths relative to the config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let csv_path = base_dir.join(&config.file);
    let csv_data = std::fs::read_to_string(&csv_path).map_err(|e| {
        CliError::new(EXIT_RUNTIME, format!("cannot read {}: {e}", csv_path.display()))
    })?;
    let mut ledger = ingest::load_csv_ledger(&csv_data, &config).map_err(CliError::from_recon)?;

    let run_report = engine::run(&config, &mut ledger).map_err(CliError::from_recon)?;

    let json_str = serde_json::to_string_pretty(&run_report)
        .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    // Flags win over [output] paths from the config; config paths resolve
    // relative to the config file.
    let json_path = output_file.or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p)));
    if let Some(path) = json_path {
        std::fs::write(&path, &json_str)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    let annotated_path =
        annotated_file.or_else(|| config.output.annotated.as_ref().map(|p| base_dir.join(p)));
    if let Some(path) = annotated_path {
        let csv_out = export::annotated_csv(&ledger, &config.policy.timestamp_format)
            .map_err(|e| CliError::new(EXIT_RUNTIME, e))?;
        std::fs::write(&path, csv_out)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot write annotated: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    eprint!("{}", report::render_report(&run_report.summary));

    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!("config ok: \"{}\" (ledger file: {})", config.name, config.file);
    Ok(())
}
