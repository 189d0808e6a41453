use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pcsctl::cli::{format_diff, format_json, resource_command, wait_for_command, Cli, Commands};
use pcsctl::config::load_settings;
use pcsctl::gateway::{Gateway, SystemRunner};
use pcsctl::wait::SystemClock;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for the JSON result
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command and print its result. Returns whether it
/// succeeded.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let settings = load_settings(cli.config.as_deref()).context("Failed to load settings")?;
    let gateway = Gateway::new(SystemRunner, settings.tools.clone());

    match cli.command {
        Commands::Resource(args) => {
            let result = resource_command(&gateway, &settings, &args, cli.check);
            if let Some(ref diff) = result.diff {
                info!("Resource '{}' differs:\n{}", args.name, format_diff(diff));
            }
            print!("{}", format_json(&result)?);
            Ok(!result.is_failure())
        }
        Commands::WaitFor(args) => {
            let outcome = wait_for_command(&gateway, SystemClock, &settings, &args);
            print!("{}", format_json(&outcome)?);
            Ok(!outcome.is_failure())
        }
    }
}
