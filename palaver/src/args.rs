use std::path::PathBuf;

use clap::Parser;

/// Palaver chat gateway
#[derive(Debug, Parser)]
#[command(name = "palaver", version, about)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "palaver.toml")]
    pub config: PathBuf,
}
