use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tailwatch::config::resolve_config_path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tailwatch")]
#[command(about = "Log tail and rotation watcher", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the log file until interrupted
    Run {
        /// Override the watched file
        #[arg(long)]
        path: Option<PathBuf>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print the last lines of the log file once
    Tail {
        #[arg(long)]
        path: Option<PathBuf>,

        /// Number of lines (defaults to watch.max_lines)
        #[arg(long, short = 'n')]
        lines: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so event output on stdout stays machine readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tailwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run { path, json }) => {
            tailwatch::cli::run::run(config_path, path, json).await?;
        }
        None => {
            // Default behavior is to run
            tailwatch::cli::run::run(config_path, None, false).await?;
        }
        Some(Commands::Tail { path, lines, json }) => {
            tailwatch::cli::tail::tail(config_path, path, lines, json).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                tailwatch::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                tailwatch::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
