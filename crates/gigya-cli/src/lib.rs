//! # gigya-cli
//!
//! Command-line access to the Gigya remote API and its identity tokens.
//!
//! ## Usage
//!
//! ```bash
//! export GIGYA_API_KEY=3_... GIGYA_USER_KEY=... GIGYA_USER_SECRET=...
//!
//! # Raw remote call
//! gigya-cli call accounts getAccountInfo -p UID=abc123 --strict
//!
//! # Walk remote data through the dynamic proxy
//! gigya-cli get accounts policies password_complexity
//!
//! # Validate an id_token
//! gigya-cli validate "$TOKEN" --issuer-format
//!
//! # Mint an unsigned token for local development
//! gigya-cli test-token --uid abc123 --expires-in 600
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG`; `--verbose` raises the
//! default level to `debug`.

pub mod cli;
pub mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Parse the command line and run it
///
/// # Errors
///
/// Whatever the selected command reports.
pub async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose, cli.debug_connection);
    commands::execute(cli).await
}

fn init_logging(verbose: bool, debug_connection: bool) {
    let mut directives = String::from(if verbose { "debug" } else { "info" });
    if debug_connection {
        directives.push_str(",gigya::connection=debug");
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
