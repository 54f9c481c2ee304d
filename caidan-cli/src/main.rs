mod commands;
mod config;

use anyhow::Context;
use caidan_core::{
    ArtifactStore, CaidanError, MemoryRouter, Navigator, SealedArtifactStore, SqliteArtifactStore,
};
use clap::{Parser, Subcommand};
use commands::session::CURRENT_PATH_KEY;
use config::CliConfig;
use dialoguer::Password;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "caidan")]
#[command(about = "Caidan - session and menu access for the lottery platform")]
#[command(version)]
struct Cli {
    /// Data directory for the session store
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Role lookup backend URL
    #[arg(short, long, global = true)]
    backend: Option<String>,

    /// Encrypt the session store with a passphrase
    #[arg(long, global = true)]
    sealed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the menu each role can see
    Menu(commands::MenuArgs),

    /// Session commands
    #[command(subcommand)]
    Session(commands::SessionCommands),

    /// Live countdown to a draw
    Countdown(commands::CountdownArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "caidan={},caidan_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &cli.config {
        Some(path) => CliConfig::load(path).await?,
        None => CliConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(url) = cli.backend {
        config.client.backend_url = Some(url);
    }
    config.client.validate()?;

    let result = match cli.command {
        Commands::Menu(args) => commands::handle_menu_command(args, &config.client),
        Commands::Countdown(args) => commands::handle_countdown_command(args).await,
        Commands::Session(cmd) => {
            let (navigator, store) = open_session(&config, cli.sealed).await?;
            let result = commands::handle_session_command(cmd, &navigator).await;
            commands::save_current_path(&navigator, store.as_ref()).await?;
            result
        }
    };

    if let Err(e) = result {
        match e {
            CaidanError::UnauthorizedNavigation {
                destination,
                redirected_to,
            } => {
                eprintln!("Error: '{}' is not available in this session", destination);
                eprintln!("Returned to {}", redirected_to);
                eprintln!("Use 'caidan session status' to see the pages you can open");
            }
            CaidanError::RoleLookupFailed(msg) => {
                eprintln!("Error: Could not resolve your role: {}", msg);
                eprintln!("The session was reset; try 'caidan session connect' again");
            }
            CaidanError::UnknownRole(role) => {
                eprintln!("Error: Unknown role '{}'", role);
                eprintln!("Known roles: user, issuer, admin");
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Open the session store and bring the navigator back to where the last
/// invocation left it.
async fn open_session(
    config: &CliConfig,
    sealed: bool,
) -> anyhow::Result<(Navigator, Arc<dyn ArtifactStore>)> {
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

    let sqlite = SqliteArtifactStore::new(&config.db_path()).await?;
    let store: Arc<dyn ArtifactStore> = if sealed {
        let passphrase = Password::new()
            .with_prompt("Session store passphrase")
            .interact()
            .context("Failed to read passphrase")?;
        Arc::new(SealedArtifactStore::open(sqlite, &passphrase).await?)
    } else {
        Arc::new(sqlite)
    };

    let last_path = store.get(CURRENT_PATH_KEY).await?;
    let navigator = Navigator::from_config(
        &config.client,
        Arc::clone(&store),
        Arc::new(MemoryRouter::default()),
    )?;

    if let Err(e) = navigator.restore().await {
        tracing::warn!("Could not restore the previous session: {}", e);
    }
    if let Some(path) = last_path {
        navigator.path_changed(&path);
    }

    Ok((navigator, store))
}
