use clap::Parser;
use storefront_edge::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve(Default::default())) {
        Command::Serve(args) => cli::serve::run(args).await,
        Command::CheckConfig => cli::serve::check_config().await,
    }
}
