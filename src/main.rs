//! FileHive - Minimal Multi-Node File Storage Cluster
//!
//! Node binary: loads configuration, starts the coordination loops and
//! the HTTP API, and runs until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filehive::api::{AppState, HttpServer};
use filehive::cluster::{ElectionService, HeartbeatMonitor};
use filehive::config::FileHiveConfig;
use filehive::error::Result;
use filehive::replication::ReplicationDispatcher;
use filehive::storage::LocalStore;

/// FileHive - Minimal Multi-Node File Storage Cluster
#[derive(Parser)]
#[command(name = "filehive")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "filehive.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the FileHive node
    Start,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "filehive.toml")]
        output: PathBuf,

        /// Node ID
        #[arg(long, default_value = "8000")]
        node_id: String,
    },

    /// Validate configuration file
    Validate,

    /// Query a running node's stats
    Status {
        /// Node base URL to query
        #[arg(short, long, default_value = "http://localhost:8000")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Start => run_start(cli.config).await,
        Commands::Init { output, node_id } => run_init(output, node_id),
        Commands::Validate => run_validate(cli.config),
        Commands::Status { address } => run_status(address).await,
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Start the FileHive node
async fn run_start(config_path: PathBuf) -> Result<()> {
    tracing::info!("Starting FileHive node...");

    let config = match FileHiveConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            tracing::error!("Please check that the config file exists and is valid TOML");
            return Err(e);
        }
    };
    tracing::info!("Loaded configuration for node: {}", config.node.id);

    let store = Arc::new(LocalStore::new(
        config.data_dir().clone(),
        config.storage.quota_bytes,
    )?);
    tracing::info!(
        "Storage ready at {:?} ({} bytes used of {} quota)",
        store.root(),
        store.usage().await?,
        store.quota_bytes()
    );

    let election = Arc::new(ElectionService::new(
        config.node.id.clone(),
        config.cluster.members.clone(),
        config.election_interval(),
    ));

    let heartbeat = Arc::new(HeartbeatMonitor::new(
        config.cluster.peers.clone(),
        config.heartbeat_interval(),
        config.probe_timeout(),
    )?);

    let replication = Arc::new(ReplicationDispatcher::new(
        config.cluster.peers.clone(),
        config.replication_delay(),
        config.replication_timeout(),
    )?);

    election.start();
    heartbeat.start();

    let state = Arc::new(AppState {
        node_id: config.node.id.clone(),
        election: Arc::clone(&election),
        heartbeat: Arc::clone(&heartbeat),
        replication,
        store,
        started_at: chrono::Utc::now(),
    });

    let http_server = HttpServer::new(
        config.node.bind_address.clone(),
        config.api.cors_enabled,
        state,
    );

    tokio::select! {
        result = http_server.start() => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    election.stop();
    heartbeat.stop();

    tracing::info!("FileHive shutdown complete");
    Ok(())
}

/// Initialize configuration file
fn run_init(output: PathBuf, node_id: String) -> Result<()> {
    let config_content = format!(
        r#"# FileHive Configuration
# Generated configuration file

[node]
id = "{node_id}"
bind_address = "0.0.0.0:{node_id}"
data_dir = "./storage_data/{node_id}"

[cluster]
members = ["8000", "8001", "8002"]
peers = ["http://localhost:8001", "http://localhost:8002"]
election_interval_secs = 10
heartbeat_interval_secs = 5
probe_timeout_secs = 2
replication_delay_ms = 500
replication_timeout_secs = 30

[storage]
quota_bytes = 104857600

[api]
cors_enabled = true

[logging]
level = "info"
format = "pretty"
"#
    );

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to configure your cluster membership and peers.");
    println!("Then start with: filehive start --config {}", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match FileHiveConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Node ID:       {}", config.node.id);
            println!("  Bind Address:  {}", config.node.bind_address);
            println!("  Data Dir:      {}", config.data_dir().display());
            println!("  Members:       {:?}", config.cluster.members);
            println!("  Peers:         {}", config.cluster.peers.len());
            println!("  Election:      {} s", config.cluster.election_interval_secs);
            println!("  Heartbeat:     {} s", config.cluster.heartbeat_interval_secs);
            println!("  Quota:         {} bytes", config.storage.quota_bytes);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Query a running node's stats
async fn run_status(address: String) -> Result<()> {
    let url = format!("{}/stats", address);

    match reqwest::get(&url).await {
        Ok(response) => {
            let stats: serde_json::Value = response
                .json()
                .await
                .map_err(|e| filehive::Error::Network(e.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&stats).unwrap());
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to get status: {}", e);
            Err(filehive::Error::Network(e.to_string()))
        }
    }
}
