//! UserSync CLI
//!
//! Command-line tools for operating a UserSync installation.
//!
//! # Commands
//!
//! - `keygen` - Generate an inbound API key
//! - `sites` - List, add or remove destinations
//! - `test-connections` - Call every destination's health endpoint
//! - `reconcile` - Replay the account set to every destination
//! - `push-user` - Send a single account to every destination
//! - `status` - Show account and destination counts
//! - `serve` - Run the inbound HTTP server

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// UserSync command-line tools.
#[derive(Parser)]
#[command(name = "usersync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the settings file (JSON)
    #[arg(global = true, short, long, default_value = "usersync.json")]
    settings: PathBuf,

    /// Path to a JSON array of accounts to load into the local store
    #[arg(global = true, short, long)]
    accounts: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an inbound API key
    Keygen {
        /// Store the key in the settings file
        #[arg(short, long)]
        write: bool,
    },

    /// Manage destinations
    Sites {
        #[command(subcommand)]
        action: SitesAction,
    },

    /// Call every destination's health endpoint
    TestConnections,

    /// Replay the account set to every destination
    Reconcile {
        /// Accounts per page
        #[arg(short, long, default_value_t = usersync_engine::DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Accounts to skip before the page
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Keep going until every page is done
        #[arg(long)]
        all: bool,
    },

    /// Send one account to every destination
    PushUser {
        /// Account ID
        id: u64,
    },

    /// Show account and destination counts
    Status,

    /// Run the inbound HTTP server
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum SitesAction {
    /// List destinations
    List,
    /// Add or replace a destination
    Add {
        /// Base URL of the remote installation
        url: String,
        /// The remote installation's API key
        api_key: String,
    },
    /// Remove a destination
    Remove {
        /// Base URL of the remote installation
        url: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let context = commands::Context::new(cli.settings, cli.accounts);

    match cli.command {
        Commands::Keygen { write } => commands::keygen::run(&context, write)?,
        Commands::Sites { action } => match action {
            SitesAction::List => commands::sites::list(&context)?,
            SitesAction::Add { url, api_key } => commands::sites::add(&context, &url, &api_key)?,
            SitesAction::Remove { url } => commands::sites::remove(&context, &url)?,
        },
        Commands::TestConnections => commands::connections::run(&context)?,
        Commands::Reconcile {
            batch_size,
            offset,
            all,
        } => commands::reconcile::run(&context, batch_size, offset, all)?,
        Commands::PushUser { id } => commands::reconcile::push_user(&context, id)?,
        Commands::Status => commands::status::run(&context)?,
        Commands::Serve { bind } => commands::serve::run(&context, bind)?,
        Commands::Version => {
            println!("UserSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("UserSync Core v{}", usersync_core::VERSION);
        }
    }

    Ok(())
}
