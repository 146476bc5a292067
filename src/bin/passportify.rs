//! Passportify CLI entry point
//!
//! Command-line interface for turning portrait photos into
//! standards-compliant passport photos using the passportify library.

#[cfg(feature = "cli")]
use passportify::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
