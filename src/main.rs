//! fixloop CLI entry point.

use clap::Parser;

use fixloop::cli::{commands, handle_error, Cli, Commands};
use fixloop::infrastructure::config::ConfigLoader;
use fixloop::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config, cli.json).await,
        Commands::Classify(args) => commands::classify::execute(args, cli.json),
        Commands::Branch(args) => commands::branch::execute(args, cli.json),
        Commands::Config(args) => commands::config::execute(args, &config, cli.json),
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
