//! CLI definition and dispatch.

mod convert;

use clap::Parser;

pub use convert::ConvertArgs;

/// d2w - turn a container image into a WSL distribution.
#[derive(Parser, Debug)]
#[command(name = "d2w", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub convert: ConvertArgs,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the conversion described by a parsed CLI.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    convert::execute(cli.convert).await
}
