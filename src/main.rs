use clap::{Args, Parser};
use std::path::PathBuf;
use tracing::info;

use modbus_serial::{setup_logging, SlaveServer, StackConfig};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dump default config and exit
    #[arg(long = "dump-default-config")]
    dump_default: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line args
    let cli = Cli::parse();

    if cli.common.dump_default {
        let config = StackConfig::default();
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    // Load config
    let config = match cli.common.config {
        Some(path) => {
            let config = StackConfig::from_file(path.clone())?;
            setup_logging(&config.logging)?;
            info!("Loaded config from {}", path.display());
            config
        }
        None => {
            let config = StackConfig::new()?;
            setup_logging(&config.logging)?;
            info!("Using layered config (files under config/, env overrides)");
            config
        }
    };

    // Create and run the slave simulator
    let server = SlaveServer::new(config)?;
    server.run().await?;

    Ok(())
}
