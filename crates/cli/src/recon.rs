//! `soa-recon run` / `soa-recon validate`.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use soa_recon::{MatchConfig, RawRecord, ReconError, ReconciliationResult};

use crate::exit_codes::{
    EXIT_IO, EXIT_RECON_DISCREPANCIES, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_SHAPE, EXIT_USAGE,
};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Reconcile statement lines against invoice candidates
    #[command(after_help = "\
Examples:
  soa-recon run --lines statement.csv --invoices invoices.json
  soa-recon run --lines statement.json --invoices invoices.json --json
  soa-recon run --lines s.csv --invoices i.csv --config match.toml --output result.json")]
    Run {
        /// Statement-of-account lines (.json array or headed .csv)
        #[arg(long)]
        lines: PathBuf,

        /// Invoice candidates (.json array or headed .csv)
        #[arg(long)]
        invoices: PathBuf,

        /// Match config (.toml or .json); defaults apply when omitted
        #[arg(long, env = "SOA_RECON_CONFIG")]
        config: Option<PathBuf>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a match config without running
    #[command(after_help = "\
Examples:
  soa-recon validate match.toml")]
    Validate {
        /// Path to the .toml or .json match config
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run {
            lines,
            invoices,
            config,
            json,
            output,
        } => cmd_recon_run(lines, invoices, config, json, output),
        ReconCommands::Validate { config } => cmd_recon_validate(config),
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn read_file(path: &Path, what: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| recon_err(EXIT_IO, format!("cannot read {what} {}: {e}", path.display())))
}

fn load_config(path: &Path) -> Result<MatchConfig, CliError> {
    let data = read_file(path, "config")?;
    let parsed = match extension(path).as_str() {
        "json" => MatchConfig::from_json(&data),
        _ => MatchConfig::from_toml(&data),
    };
    parsed.map_err(|e| recon_err(EXIT_RECON_INVALID_CONFIG, format!("{}: {e}", path.display())))
}

fn load_records(path: &Path, what: &str) -> Result<Vec<RawRecord>, CliError> {
    let loader: fn(&str) -> Result<Vec<RawRecord>, ReconError> = match extension(path).as_str() {
        "json" => soa_recon::load_json_records,
        "csv" => soa_recon::load_csv_records,
        other => {
            return Err(recon_err(
                EXIT_USAGE,
                format!("unsupported {what} file type '.{other}': {}", path.display()),
            )
            .with_hint("use a .json array of objects or a headed .csv"))
        }
    };
    let data = read_file(path, what)?;
    loader(&data).map_err(|e| recon_err(EXIT_IO, format!("{}: {e}", path.display())))
}

fn engine_err(err: ReconError) -> CliError {
    let code = match &err {
        ReconError::Shape { .. } => EXIT_RECON_SHAPE,
        ReconError::Config(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::Load(_) => EXIT_IO,
    };
    recon_err(code, err.to_string())
}

fn cmd_recon_run(
    lines_path: PathBuf,
    invoices_path: PathBuf,
    config_path: Option<PathBuf>,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = match config_path {
        Some(ref path) => load_config(path)?,
        None => MatchConfig::default(),
    };
    let lines = load_records(&lines_path, "statement lines")?;
    let invoices = load_records(&invoices_path, "invoices")?;
    tracing::debug!(
        "loaded {} statement lines from {}, {} invoices from {}",
        lines.len(),
        lines_path.display(),
        invoices.len(),
        invoices_path.display()
    );

    let result = soa_recon::run_reconciliation(&lines, &invoices, &config).map_err(engine_err)?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| recon_err(EXIT_IO, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_IO, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&result);

    if !result.summary.is_clean() {
        return Err(recon_err(EXIT_RECON_DISCREPANCIES, ""));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &ReconciliationResult) {
    let s = &result.summary;
    eprintln!(
        "soa recon: {}/{} lines matched, {}/{} invoices matched, {} discrepancies",
        s.matched_lines,
        s.total_lines,
        s.matched_invoices,
        s.total_invoices,
        result.discrepancies.len(),
    );

    if !s.matches_by_pass.is_empty() {
        let by_pass: Vec<String> = s
            .matches_by_pass
            .iter()
            .map(|(pass, n)| format!("pass {pass}: {n}"))
            .collect();
        eprintln!("  pairs by {}", by_pass.join(", "));
    }

    for d in &result.discrepancies {
        eprintln!("  {} [{}] {}: {}", d.id, d.severity, d.kind, d.description);
    }
}

fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "valid: date window {} days, amount tolerance abs {} / pct {}, group matching {}",
        config.date_tolerance_days,
        config.amount_tolerance_abs,
        config.amount_tolerance_pct,
        if config.allow_partial { "on" } else { "off" },
    );
    Ok(())
}
