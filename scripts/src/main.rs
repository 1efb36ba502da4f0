use clap::Parser;
use scripts::cli::Cli;
use tracing::Level;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();

    let Cli {
        config,
        network,
        verbose,
        command,
    } = Cli::parse();

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().pretty().with_max_level(level).init();

    command.run(&config, &network).await?;
    Ok(())
}
