mod cli;
mod ops;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands};
use rewind::logging::{self, Profile};

fn main() {
    let cli = Cli::parse();
    logging::init(Profile::detect(), cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(cli)) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_ctrl_c.cancel();
        }
    });

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init { target } => {
            ops::do_init(config, target.as_deref(), &cancel).await?;
        }
        Commands::Reset { target } => {
            ops::do_reset(config, target.as_deref(), &cancel).await?;
        }
        Commands::Snapshot { target } => {
            ops::do_snapshot(config, &target, &cancel).await?;
        }
        Commands::Status => {
            ops::do_status(config, &cancel).await?;
        }
        Commands::Targets => {
            ops::do_targets(config)?;
        }
        Commands::Version => {
            ops::do_version();
        }
    }

    Ok(())
}
