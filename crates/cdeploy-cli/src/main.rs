//! cli entrypoint for cdeploy.

mod app;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// main entrypoint for the async cli.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = app::Cli::parse();
    init_tracing(cli.verbose);
    app::run(cli).await
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "cdeploy=debug" } else { "cdeploy=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
