mod commands;
mod progress;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "Declare it once. StackFlow provisions it in order.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a stack file: references, duplicates and cycles
    Validate {
        /// Stack file (searched for when omitted)
        file: Option<PathBuf>,
    },
    /// Print resources in provisioning order with their dependencies
    Graph {
        /// Stack file (searched for when omitted)
        file: Option<PathBuf>,
    },
    /// Provision the stack against the local simulated provider
    Apply {
        /// Stack file (searched for when omitted)
        file: Option<PathBuf>,
        /// Write the rendered gateway config here instead of stdout
        #[arg(short = 'o', long)]
        gateway_out: Option<PathBuf>,
        /// Gateway config format
        #[arg(short, long, value_enum, default_value_t = GatewayFormat::Yaml)]
        format: GatewayFormat,
        /// Make the provider reject this resource id (repeatable)
        #[arg(long = "fail", value_name = "ID")]
        fail: Vec<String>,
        /// Maximum provider calls in flight (overrides settings)
        #[arg(short = 'j', long, env = "STACK_CONCURRENCY")]
        concurrency: Option<usize>,
    },
    /// Show version information
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GatewayFormat {
    /// Kong declarative config
    Yaml,
    /// Topology as JSON
    Json,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Commands::Validate { file } => commands::validate::handle(file)?,
        Commands::Graph { file } => commands::graph::handle(file)?,
        Commands::Apply {
            file,
            gateway_out,
            format,
            fail,
            concurrency,
        } => {
            let args = commands::apply::ApplyArgs {
                file,
                gateway_out,
                format,
                fail,
                concurrency,
            };
            commands::apply::handle(args).await?;
        }
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
