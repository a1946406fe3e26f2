use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use switchboard::transports::validate;
use switchboard::{Config, Orchestrator, TaskUnits, load_registry};

/// Switchboard - plugin registry and transport orchestrator for chat bots
#[derive(Parser)]
#[command(name = "switchboard", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/switchboard/config.toml)
    #[arg(short, long, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Plugin directory, overriding the config file
    #[arg(long)]
    plugin_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the plugin directory once and list what was found
    Plugins {
        /// Print the registry as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configured transports without connecting
    Transports,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set
    let filter = match cli.verbose {
        0 => "info,switchboard=info",
        1 => "info,switchboard=debug",
        2 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.plugin_dir {
        config.plugin_dir = dir;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Plugins { json } => cmd_plugins(&config, json),
            Command::Transports => cmd_transports(&config),
        };
    }

    tracing::info!(
        plugin_dir = %config.plugin_dir.display(),
        transports = config.transports.len(),
        checking_new_plugins = config.checking_new_plugins,
        "starting switchboard"
    );

    let (orchestrator, task) = Orchestrator::spawn(Arc::new(TaskUnits));
    orchestrator.initialize(config.into_init_request()).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    for transport in orchestrator.transports().await? {
        tracing::info!(
            identity = %transport.identity,
            handler_alive = transport.handler_alive,
            client_alive = transport.client_alive,
            "stopping transport"
        );
    }

    orchestrator.shutdown().await?;
    task.await?;

    Ok(())
}

/// List the plugin registry
fn cmd_plugins(config: &Config, json: bool) -> anyhow::Result<()> {
    let plugins = load_registry(&config.plugin_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(());
    }

    if plugins.is_empty() {
        println!("No plugins in {}", config.plugin_dir.display());
        return Ok(());
    }

    for plugin in &plugins {
        println!(
            "{:<24} {:<8} {}",
            plugin.name,
            plugin.interpreter.to_string(),
            plugin.path.display()
        );
    }

    Ok(())
}

/// Validate every configured transport
fn cmd_transports(config: &Config) -> anyhow::Result<()> {
    if config.transports.is_empty() {
        println!("No transports configured");
        return Ok(());
    }

    let mut invalid = 0usize;
    for spec in &config.transports {
        match validate(spec) {
            Ok(identity) => println!("ok    {identity}"),
            Err(e) => {
                invalid += 1;
                println!("error {}: {e}", spec.kind());
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} of {} transports are invalid", config.transports.len());
    }

    Ok(())
}
