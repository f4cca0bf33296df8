//! mud - command-line front end for mud project files
//!
//! Opens `.mud` projects through the editor core, resolves entity assets
//! against the local asset store and reports what loaded.

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = cli::run(cli).await {
        error!("{}", err);
        std::process::exit(1);
    }
}
