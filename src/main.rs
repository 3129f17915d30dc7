//! Tether CLI binary entry point.

use clap::Parser;
use tether::cli::{AuthCommands, Cli, Commands};
use tether::config::TetherConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match TetherConfig::from_env() {
        Ok(config) => run(&config, cli.command).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(config: &TetherConfig, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Classify(args) => tether::cli::handle_classify(config, &args),
        Commands::Taxonomy(args) => tether::cli::handle_taxonomy(config, &args),
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Status => tether::cli::auth::handle_status(config).await,
            AuthCommands::Save(args) => {
                tether::cli::auth::handle_save(config, &args.access_token, args.refresh_token.as_deref())
                    .await
            }
            AuthCommands::Refresh => tether::cli::auth::handle_refresh(config).await,
            AuthCommands::Logout => tether::cli::auth::handle_logout(config).await,
        },
    }
}
