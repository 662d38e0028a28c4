//! Operator CLI. Kept deliberately small: the platform's two daemons
//! (`oc-processor`, `oc-requestor`) own all order state, so there is
//! nothing here to inspect beyond their config and `/health` endpoint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oc")]
#[command(about = "Order-coordination platform CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Poll a daemon's `/health` endpoint
    Health {
        /// Base URL of the daemon (e.g. http://127.0.0.1:8081)
        #[arg(long)]
        base_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = oc_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Health { base_url } => {
            let url = format!("{base_url}/health");
            let body = reqwest::get(&url)
                .await
                .with_context(|| format!("GET {url} failed"))?
                .text()
                .await
                .context("reading health response")?;
            println!("{body}");
        }
    }

    Ok(())
}
