use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod session;

use commands::{ConfigCommand, LoginCommand, RegisterCommand, WhoamiCommand};
use config::Config;

#[derive(Parser)]
#[command(name = "homekeep")]
#[command(version)]
#[command(about = "Sign in to your Homekeep household from the terminal", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login(LoginCommand),

    /// Create an account and its first household
    Register(RegisterCommand),

    /// Sign out
    Logout,

    /// Show whether you are signed in
    Status,

    /// Show the signed-in user and households
    Whoami(WhoamiCommand),

    /// Print the current session token
    Token,

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homekeep=info,homekeep_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Save config path for config init
    let cli_config_path = cli.config.clone();

    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Config(cmd)) => {
            cmd.run(&config, cli_config_path)?;
        }
        Some(Commands::Login(cmd)) => {
            cmd.run(&session::open(&config)).await?;
        }
        Some(Commands::Register(cmd)) => {
            cmd.run(&session::open(&config)).await?;
        }
        Some(Commands::Logout) => {
            commands::logout(&session::open(&config)).await;
        }
        Some(Commands::Status) => {
            commands::status(&session::open(&config), &config).await;
        }
        Some(Commands::Whoami(cmd)) => {
            cmd.run(&session::open(&config)).await?;
        }
        Some(Commands::Token) => {
            commands::token(&session::open(&config)).await?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
