mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{chat::ChatSubcommand, config::ConfigSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "helmsman",
    about = "Run the support bot stack locally: action server, dialogue engine and chat UI",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from helmsman.yaml or .git/)
    #[arg(long, global = true, env = "HELMSMAN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the model, start all services and keep the dialogue engine alive until Ctrl-C
    Up {
        /// Don't open the chat UI in a browser
        #[arg(long)]
        no_open: bool,
    },

    /// Show the model artifact `up` would serve
    Artifact {
        /// Only scan the models directory; never train or copy
        #[arg(long)]
        no_build: bool,
    },

    /// Probe each service once and report which are reachable
    Status,

    /// Talk to the running dialogue engine
    Chat {
        #[command(subcommand)]
        subcommand: ChatSubcommand,
    },

    /// Show, scaffold or validate helmsman.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Up { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Up { no_open } => cmd::up::run(&root, no_open),
        Commands::Artifact { no_build } => cmd::artifact::run(&root, no_build, cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Chat { subcommand } => cmd::chat::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
