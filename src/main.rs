#![forbid(unsafe_code)]

//! `droid-session-probe` binary.
//!
//! Loads configuration from the environment (with CLI overrides), runs the
//! two-credential session reuse scenario, and prints the line report to
//! stdout.  Exit codes: 0 on a completed probe (whatever its verdict), 2 on
//! missing credentials, 1 on any harness fault.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use droid_session_probe::scenario;
use droid_session_probe::{AppError, ProbeConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "droid-session-probe",
    about = "Probe droid CLI session credential isolation",
    version,
    long_about = None
)]
struct Cli {
    /// Override the droid CLI executable (defaults to $DROID_BIN).
    #[arg(long)]
    droid_bin: Option<PathBuf>,

    /// Override the model identifier (defaults to $DROID_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Config(msg)) => {
            eprintln!("{msg}");
            ExitCode::from(2)
        }
        Err(err) => {
            error!(%err, "probe failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    let mut config = ProbeConfig::from_env()?;
    if let Some(droid_bin) = args.droid_bin {
        config.droid_bin = droid_bin;
    }
    if let Some(model) = args.model {
        config.model = model;
    }

    info!(
        droid_bin = %config.droid_bin.display(),
        model = config.model,
        "starting two-credential session probe"
    );

    let report = scenario::run(&config).await?;
    print!("{}", report.render());
    Ok(())
}

/// Initialise the tracing subscriber with env-filter support.
fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("droid_session_probe=info"));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))
}
