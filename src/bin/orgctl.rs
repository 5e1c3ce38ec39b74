//! Thin CLI front end: argument parsing, log-level selection, and
//! file I/O only — every reconciliation decision lives in the `orgctl`
//! library.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use orgctl::cancellation::CancellationToken;
use orgctl::driver::ConvergenceDriver;
use orgctl::model::Organization;
use orgctl::value_objects::OrderedMap;
use orgctl::{codec, loader, provider, validator};

#[derive(Parser, Debug)]
#[command(name = "orgctl", about = "Reconcile a hierarchical cloud organization against a declared configuration")]
struct Cli {
    #[arg(long = "config-file")]
    config_file: PathBuf,

    #[arg(long)]
    profile: Option<String>,

    #[arg(long)]
    converge: bool,

    #[arg(long = "dry-run-report-file")]
    dry_run_report_file: Option<PathBuf>,

    #[arg(long = "converge-report-file")]
    converge_report_file: Option<PathBuf>,

    #[arg(long = "log-level", default_value = "INFO")]
    log_level: String,
}

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_INVALID: u8 = 2;
const EXIT_ACTUAL_LOAD_FAILED: u8 = 3;
const EXIT_CONVERGENCE_ABORTED: u8 = 4;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::from(EXIT_CONFIG_INVALID)
        }
    }
}

fn init_logging(level: &str) {
    let filter = match level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}

fn run(cli: &Cli) -> Result<u8, String> {
    let raw = std::fs::read_to_string(&cli.config_file).map_err(|err| format!("reading {}: {err}", cli.config_file.display()))?;
    let doc: OrderedMap = serde_yaml::from_str(&raw).map_err(|err| format!("parsing {}: {err}", cli.config_file.display()))?;

    let mut declared = match codec::load(&doc) {
        Ok(org) => org,
        Err(err) => {
            tracing::error!("declared configuration is invalid: {err}");
            return Ok(EXIT_CONFIG_INVALID);
        }
    };
    declared.provisioner = declared.provisioner.clone().with_profile_override(cli.profile.clone());
    if let Err(err) = validator::raise_if_invalid(&mut declared) {
        tracing::error!("declared organization is invalid: {err}");
        return Ok(EXIT_CONFIG_INVALID);
    }

    // No concrete ProviderClient ships with this crate. `orgctl` wires
    // the in-memory double so the CLI is runnable end-to-end; a production
    // deployment injects a real implementation here.
    let client = provider::InMemoryProviderClient::new(declared.root_account_id.clone());

    let mut actual = Organization::actual(declared.root_account_id.clone());
    if let Err(err) = loader::load(&client, &mut actual) {
        tracing::error!("loading the actual organization failed: {err}");
        return Ok(EXIT_ACTUAL_LOAD_FAILED);
    }
    validator::validate(&mut actual);

    let plan = orgctl::differ::diff(&declared, &actual);
    if let Some(path) = &cli.dry_run_report_file {
        write_yaml(path, &plan)?;
    }
    tracing::info!(changes = !plan.is_empty(), "dry-run plan computed");

    if !cli.converge {
        return Ok(EXIT_OK);
    }

    let driver = ConvergenceDriver::new(&client, CancellationToken::new());
    let report = match driver.converge(&declared, &actual) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!("convergence failed: {err}");
            return Ok(EXIT_CONVERGENCE_ABORTED);
        }
    };
    if let Some(path) = &cli.converge_report_file {
        write_yaml(path, &report)?;
    }
    if report.cancelled {
        tracing::warn!("convergence was cancelled before completion");
        return Ok(EXIT_CONVERGENCE_ABORTED);
    }
    Ok(EXIT_OK)
}

fn write_yaml<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), String> {
    let rendered = serde_yaml::to_string(value).map_err(|err| format!("serialising report: {err}"))?;
    std::fs::write(path, rendered).map_err(|err| format!("writing {}: {err}", path.display()))
}
