//! ACR Publisher CLI
//!
//! Push a local container image to Azure Container Registry

use acr_publisher::core::traits::{ExecuteRequest, Hook, ReleaseContext, ReleasePlugin};
use acr_publisher::{
    AcrPlugin, ConfigLoader, ExecutionContext, PublishError, format_validation_result,
    telemetry,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::{Level, warn};

/// Push a local container image to Azure Container Registry
#[derive(Parser)]
#[command(name = "acr-publisher")]
#[command(version = acr_publisher::plugins::PLUGIN_VERSION)]
#[command(about = "Push container images to Azure Container Registry", long_about = None)]
struct Cli {
    /// Emit log lines as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tag and push the configured image
    Publish {
        /// Configuration file (.yaml, .yml, .toml or .json)
        #[arg(short, long)]
        config: PathBuf,

        /// Version being released
        #[arg(long, default_value = "")]
        release_version: String,

        /// Previously released version
        #[arg(long, default_value = "")]
        previous_version: String,

        /// Git tag of the release
        #[arg(long, default_value = "")]
        tag_name: String,

        /// Branch the release was cut from
        #[arg(long, default_value = "")]
        branch: String,

        /// Release type (major, minor, patch, ...)
        #[arg(long, default_value = "")]
        release_type: String,

        /// Only log what would be pushed
        #[arg(long)]
        dry_run: bool,

        /// Abort the whole publish after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Validate a configuration file
    Check {
        /// Configuration file (.yaml, .yml, .toml or .json)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print plugin metadata
    Info,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs, Level::INFO);

    match run(cli.command).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Publish {
            config,
            release_version,
            previous_version,
            tag_name,
            branch,
            release_type,
            dry_run,
            timeout_secs,
        } => {
            let context = ReleaseContext {
                version: release_version,
                previous_version,
                tag_name,
                branch,
                release_type,
            };
            publish_command(&config, context, dry_run, timeout_secs).await
        }
        Commands::Check { config } => check_command(&config).await,
        Commands::Info => info_command(),
    }
}

async fn load_config(path: &Path) -> Result<acr_publisher::RawConfig> {
    let env: HashMap<String, String> = std::env::vars().collect();
    ConfigLoader::load_file(path, &env)
        .await
        .with_context(|| format!("could not load {}", path.display()))
}

async fn publish_command(
    config_path: &Path,
    context: ReleaseContext,
    dry_run: bool,
    timeout_secs: Option<u64>,
) -> Result<i32> {
    let config = load_config(config_path).await?;
    let plugin = AcrPlugin::new();

    let (mut ctx, cancel) = ExecutionContext::cancellable();
    if let Some(seconds) = timeout_secs {
        ctx = ctx.with_timeout(Duration::from_secs(seconds));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let request = ExecuteRequest {
        hook: Hook::PostPublish,
        dry_run,
        config,
        context,
    };

    match plugin.execute(request, &ctx).await {
        Ok(response) => {
            eprintln!("\n✅ {}", response.message);
            println!("{}", serde_json::to_string_pretty(&response.outputs)?);
            Ok(0)
        }
        Err(e) => {
            report_error(&e);
            Ok(1)
        }
    }
}

fn report_error(error: &PublishError) {
    eprintln!("\n❌ Publishing failed [{}]", error.code());
    eprintln!("{}", error);
    if let Some(output) = error.tool_output()
        && !output.trim().is_empty()
    {
        eprintln!("\nTool output:\n{}", output.trim_end());
    }

    eprintln!("\nSuggested actions:");
    for action in error.suggested_actions() {
        eprintln!("  - {}", action);
    }
}

async fn check_command(config_path: &Path) -> Result<i32> {
    let config = load_config(config_path).await?;
    let result = AcrPlugin::new().validate(&config);

    println!("{}", format_validation_result(&result));
    Ok(if result.valid { 0 } else { 1 })
}

fn info_command() -> Result<i32> {
    let info = AcrPlugin::new().info();
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(0)
}
