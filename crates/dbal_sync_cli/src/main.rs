//! DBAL sync CLI
//!
//! Command-line tools for the DBAL remote service.
//!
//! # Commands
//!
//! - `health` - Check that the service answers
//! - `adapters`, `config`, `switch-adapter`, `test-connection`, `seed` - Admin plane
//! - `pull` - Pull every mapped collection
//! - `push` - Push a snapshot file
//! - `detect` - Report conflicts between a snapshot file and the remote

mod commands;

use clap::{Parser, Subcommand};
use dbal_sync_engine::{
    EntityMapping, HttpTransport, MemoryRemote, MemoryStore, ReqwestTransport, SyncConfig,
    SyncEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// DBAL sync and admin command-line tools.
#[derive(Parser)]
#[command(name = "dbal-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the remote service (overrides DBAL_BASE_URL)
    #[arg(global = true, long)]
    base_url: Option<String>,

    /// Tenant id (overrides DBAL_TENANT_ID)
    #[arg(global = true, short, long)]
    tenant: Option<String>,

    /// Run against an in-memory remote instead of the network
    #[arg(global = true, long)]
    memory: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service answers
    Health,

    /// List known database adapters
    Adapters {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the active adapter
    Config,

    /// Switch the active adapter
    SwitchAdapter {
        /// Adapter name
        adapter: String,
        /// Database URL
        database_url: String,
    },

    /// Test a database connection without switching
    TestConnection {
        /// Adapter name
        adapter: String,
        /// Database URL
        database_url: String,
    },

    /// Load seed data
    Seed {
        /// Overwrite existing records
        #[arg(long)]
        force: bool,

        /// Seed directory on the server
        #[arg(long)]
        seed_dir: Option<String>,
    },

    /// Pull every mapped collection
    Pull {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Push a snapshot file keyed by collection name
    Push {
        /// Snapshot JSON file
        snapshot: PathBuf,
    },

    /// Report conflicts between a snapshot file and the remote
    Detect {
        /// Snapshot JSON file
        snapshot: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let engine = build_engine(&cli)?;

    match cli.command {
        Commands::Health => {
            commands::admin::health(engine.admin()).await?;
        }
        Commands::Adapters { format } => {
            commands::admin::adapters(engine.admin(), &format).await?;
        }
        Commands::Config => {
            commands::admin::config(engine.admin()).await?;
        }
        Commands::SwitchAdapter {
            adapter,
            database_url,
        } => {
            commands::admin::switch_adapter(engine.admin(), &adapter, &database_url).await?;
        }
        Commands::TestConnection {
            adapter,
            database_url,
        } => {
            commands::admin::test_connection(engine.admin(), &adapter, &database_url).await?;
        }
        Commands::Seed { force, seed_dir } => {
            commands::admin::seed(engine.admin(), force, seed_dir).await?;
        }
        Commands::Pull { format } => {
            commands::pull::run(&engine, &format).await?;
        }
        Commands::Push { snapshot } => {
            commands::push::run(&engine, &snapshot).await?;
        }
        Commands::Detect { snapshot, format } => {
            commands::detect::run(&engine, &snapshot, &format).await?;
        }
    }

    Ok(())
}

fn build_engine(cli: &Cli) -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let mut config = SyncConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.as_str());
    }
    if let Some(tenant) = &cli.tenant {
        config = config.with_tenant(tenant.as_str());
    }
    config.validate()?;

    let transport: Arc<dyn HttpTransport> = if cli.memory {
        let remote = match &config.admin_token {
            Some(token) => MemoryRemote::new().with_admin_token(token.as_str()),
            None => MemoryRemote::new(),
        };
        Arc::new(remote)
    } else {
        Arc::new(ReqwestTransport::new(&config)?)
    };

    Ok(SyncEngine::new(
        config,
        EntityMapping::default().shared(),
        transport,
        Arc::new(MemoryStore::new()),
    ))
}
