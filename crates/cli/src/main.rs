// soa-recon CLI - statement-of-account reconciliation from the shell

mod exit_codes;
mod recon;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;
use recon::ReconCommands;

#[derive(Parser)]
#[command(name = "soa-recon")]
#[command(about = "Match statement-of-account lines to invoices and explain what is left over")]
#[command(version)]
#[command(long_version = long_version())]
struct Cli {
    /// Log pass-by-pass progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: ReconCommands,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("SOA_RECON_BUILD"), ")",
        "\nengine:  soa-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("SOA_RECON_TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match recon::cmd_recon(cli.command) {
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

/// Diagnostics go to stderr so stdout stays clean for `--json`. `--verbose`
/// forces debug; otherwise `RUST_LOG` applies, defaulting to warnings.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .init();
}

pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
