//! kiln - CLI for the Blender and Trellis bridge
//!
//! Subcommands:
//! - `kiln tools` - List the tool catalog with input schemas
//! - `kiln call <tool> [json]` - Call one tool
//! - `kiln prompt [name]` - List prompts, or print one
//! - `kiln ping` - Check the Blender addon and its enabled features
//! - `kiln send <type> [json]` - Send a raw command to the addon
//! - `kiln status <task_id>` - Check a text-to-3D task
//! - `kiln config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kilnconf::KilnConfig;

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Drive Blender and Trellis text-to-3D from the command line")]
#[command(version)]
struct Cli {
    /// Config file, used in place of ./kiln.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
    #[arg(long, global = true)]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available tools and their input schemas
    Tools,

    /// Call a tool by name
    Call {
        /// Tool name (see `kiln tools`)
        tool: String,

        /// JSON object of arguments
        json: Option<String>,
    },

    /// List prompts, or print one by name
    Prompt {
        /// Prompt name, e.g. asset_creation_strategy
        name: Option<String>,
    },

    /// Check that the Blender addon answers
    Ping,

    /// Send a raw command to the Blender addon
    Send {
        /// Command type, e.g. get_scene_info
        command_type: String,

        /// JSON object of params
        json: Option<String>,
    },

    /// Check a text-to-3D task, polling briefly
    Status {
        /// Task ID returned by create_3d_model_from_text
        task_id: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        KilnConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(endpoint) = cli.otlp_endpoint {
        config.telemetry.otlp_endpoint = endpoint;
    }

    telemetry::init(&config.telemetry.log_level, config.telemetry.otlp())?;

    let result = match cli.command {
        Commands::Tools => commands::tools(),
        Commands::Call { tool, json } => commands::call(&config, &tool, json.as_deref()).await,
        Commands::Prompt { name } => commands::prompt(name.as_deref()),
        Commands::Ping => commands::ping(&config).await,
        Commands::Send { command_type, json } => {
            commands::send(&config, &command_type, json.as_deref()).await
        }
        Commands::Status { task_id } => commands::status(&config, &task_id).await,
        Commands::Config => commands::show_config(&config),
    };

    telemetry::shutdown();
    result
}
