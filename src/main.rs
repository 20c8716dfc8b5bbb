//! packs - pack installer CLI
//!
//! Install skills, agents and hooks from pack repositories into a workspace.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use packs::Result;
use packs::app::AppContext;
use packs::cancel::CancelToken;
use packs::cli::Cli;

/// Exit status after a second interrupt, following the shell's 128 + SIGINT.
const INTERRUPTED: i32 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    match run(&cli, cancel) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.robot {
                // Robot mode: JSON error output to stdout
                let error_json = serde_json::json!({
                    "error": true,
                    "code": e.code(),
                    "message": e.to_string(),
                });
                println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, cancel: CancelToken) -> Result<()> {
    let ctx = AppContext::from_cli(cli, cancel)?;
    packs::cli::commands::run(&ctx, &cli.command)
}

/// The first interrupt stops the running operation before its next step.
/// A second one exits immediately.
fn install_interrupt_handler(cancel: &CancelToken) {
    let token = cancel.clone();
    let result = ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(INTERRUPTED);
        }
        tracing::warn!(target: "app", "interrupt received, stopping after the current step");
        token.cancel();
    });
    if let Err(err) = result {
        tracing::warn!(target: "app", error = %err, "failed to install interrupt handler");
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,packs=info",
        1 => "info,packs=debug",
        2 => "debug,packs=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
