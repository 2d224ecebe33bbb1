use clap::Parser;
use rental_cache::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::Warm(args) => cli::warm::run(args).await,
        Command::Flush(args) => cli::flush::run(args).await,
        Command::Stats => cli::stats::run().await,
    }
}
