//! Chat Warden CLI - operator tooling for the moderation pipeline

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use warden_core::{Warden, WardenConfig};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Chat Warden - content-risk screening for generative text services")]
struct Cli {
    /// Configuration file path (JSON). Defaults are used when absent.
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Dry-run one message through the pipeline and print the trace
    Scan {
        /// The message to screen
        text: String,
        /// Identity to screen as
        #[arg(short, long, default_value = "cli")]
        identity: String,
    },
    /// Check configuration validity
    Check,
    /// Show recent security events
    Status {
        /// How many events to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

fn load_config(path: Option<&str>) -> anyhow::Result<WardenConfig> {
    match path {
        Some(path) => WardenConfig::from_file(path).with_context(|| format!("loading {path}")),
        None => Ok(WardenConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Scan { text, identity }) => {
            let warden = Warden::new(config)?;
            let screening = warden.screen(&identity, &text, &[]);
            println!("{}", serde_json::to_string_pretty(&screening)?);
        }
        Some(Commands::Check) => {
            Warden::new(config)?;
            println!("configuration OK");
        }
        Some(Commands::Status { limit }) => {
            let warden = Warden::new(config)?;
            let events = warden.recent_events(limit)?;
            if events.is_empty() {
                println!("no recorded events");
            } else {
                for event in events {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
        }
        None => {
            println!("Chat Warden v0.1.0 - use --help for commands");
        }
    }

    Ok(())
}
