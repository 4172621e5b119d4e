//! PrimeBug CLI binary.

use anyhow::Result;
use primebug::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the primebug CLI.
///
/// Uses tokio's current_thread runtime: every command is a short sequence
/// of storage calls.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Controlled via RUST_LOG
    // Example: RUST_LOG=primebug=debug,primebug_docstore=trace primebug bug list ...
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("primebug=info,primebug_docstore=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting primebug CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("PrimeBug CLI completed successfully");
    Ok(())
}
