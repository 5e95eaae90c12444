use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    sitescout::logging::init().context("init logging")?;

    let cli = sitescout::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        sitescout::cli::Command::Crawl(args) => {
            sitescout::crawl::run(args).await.context("crawl")?;
        }
    }

    Ok(())
}
