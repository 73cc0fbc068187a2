//! ybrpc - Command-line client for cluster masters and tablet servers
//!
//! Finds the master leader (or dials a given node) and runs one operation.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use ybrpc_client::{ClientConfig, ConfigError};

#[derive(Parser)]
#[command(name = "ybrpc")]
#[command(about = "Command-line client for cluster masters and tablet servers")]
#[command(version)]
pub struct Cli {
    /// Master addresses, comma-separated (port defaults to 7100)
    #[arg(short, long, value_delimiter = ',')]
    masters: Option<Vec<String>>,

    /// Path to a YAML configuration file
    #[arg(short, long, env = "YBRPC_CONFIG")]
    config: Option<PathBuf>,

    /// RPC timeout in milliseconds, also enforced locally
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    // ===== TLS Options =====
    /// Enable TLS connection
    #[arg(long)]
    tls: bool,

    /// Path to CA certificate for server verification
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Path to client certificate (for mTLS)
    #[arg(long)]
    client_cert: Option<PathBuf>,

    /// Path to client private key (for mTLS)
    #[arg(long)]
    client_key: Option<PathBuf>,

    /// Skip server certificate verification (INSECURE)
    #[arg(long, short = 'k')]
    insecure: bool,

    /// Server name for TLS SNI (defaults to server hostname)
    #[arg(long)]
    server_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Find the master leader
    Leader,

    /// Show the registration and role of a master
    MasterRegistration {
        /// Master to ask (defaults to the leader)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// List all masters
    ListMasters,

    /// List tablet servers
    ListTservers {
        /// Only servers in the primary cluster
        #[arg(long)]
        primary_only: bool,
    },

    /// Ping a server
    Ping {
        /// Server to ping (defaults to the leader)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Read a server's hybrid clock
    ServerClock {
        /// Server to ask (defaults to the leader)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Inspect or toggle the load balancer
    LoadBalancer {
        #[command(subcommand)]
        action: LoadBalancerAction,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum LoadBalancerAction {
    /// Show whether the load balancer is enabled
    Status,
    /// Enable the load balancer
    Enable,
    /// Disable the load balancer
    Disable,
    /// Check whether the load balancer has no pending work
    Idle,
    /// Check whether tablet load is balanced
    Balanced {
        /// Wait until this many tablet servers have registered
        #[arg(long)]
        expected_servers: Option<i32>,
    },
}

/// Builds the client configuration: file, then environment, then flags.
fn build_config(cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(masters) = &cli.masters {
        config.masters = masters.clone();
    }
    if let Some(ms) = cli.timeout_ms {
        config.rpc_timeout_ms = ms;
        config.enforce_deadline = true;
    }

    if cli.tls || cli.ca_cert.is_some() || cli.client_cert.is_some() || cli.insecure {
        let tls = &mut config.tls;
        tls.enabled = true;
        if let Some(path) = &cli.ca_cert {
            tls.ca_cert_path = Some(path.clone());
        }
        if let Some(path) = &cli.client_cert {
            tls.client_cert_path = Some(path.clone());
        }
        if let Some(path) = &cli.client_key {
            tls.client_key_path = Some(path.clone());
        }
        tls.insecure = tls.insecure || cli.insecure;
    }
    if let Some(name) = &cli.server_name {
        config.tls.server_name = Some(name.clone());
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Configuration error".red(), e);
            std::process::exit(1);
        }
    };

    let client = match commands::connect(&cli.command, &config).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}: {}", "Connection failed".red(), e);
            std::process::exit(1);
        }
    };

    match commands::execute(&client, cli.command, cli.json).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            let _ = client.close().await;
            std::process::exit(1);
        }
    }

    client.close().await?;
    Ok(())
}
