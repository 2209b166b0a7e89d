use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use poolnode::{run, Collaborators};
use poolnode_config::{LogConfig, LogFormat};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "poolnode", version, about = "Blockchain node with optional mining-pool roles")]
struct NodeArgs {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Log filter, overrides the config file
    #[arg(long, env = "POOLNODE_LOG")]
    log_level: Option<String>,

    /// Data directory, overrides the config file
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

fn init_tracing(log: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log.level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match log.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn run_node(args: NodeArgs) -> anyhow::Result<i32> {
    let mut config = match poolnode_config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LogConfig::default())?;
            error!(target: "poolnode", error = %e, "invalid configuration");
            error!(target: "poolnode", "Specify a valid config file with --config=FILE");
            return Ok(1);
        }
    };
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    init_tracing(&config.log)?;
    info!(target: "poolnode", config = ?config, "configuration loaded");

    let collaborators = Collaborators::local(&config).await?;
    let reason = run(config, collaborators).await?;
    Ok(reason.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = NodeArgs::parse();
    match run_node(args).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            error!(target: "poolnode", error = %format!("{:#}", e), "node failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
