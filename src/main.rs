use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use spdlog::prelude::*;

use techblog::build::build_site;
use techblog::config::Config;
use techblog::relay::{self, RelayConfig};
use techblog::serve::watch_and_serve;

#[derive(Parser)]
#[command(
    name = "techblog",
    version,
    about = "Static site generator for a personal technology blog"
)]
struct Cli {
    /// Path to a project file (defaults to ./techblog.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site into the output directory
    Build {
        /// Use relative links and skip sample-post creation (GitHub Pages
        /// export)
        #[arg(long)]
        github: bool,
    },

    /// Build, then rebuild on change while serving the output over HTTP
    Watch,

    /// Run the OAuth relay for the CMS login flow
    Relay,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Build { github } => {
            let config = Config::load(cli.config.as_deref())?;
            let config = if github {
                config.for_github_pages()
            } else {
                config
            };
            build_site(&config)?;
        }
        Command::Watch => {
            let config = Config::load(cli.config.as_deref())?;
            watch_and_serve(config)?;
        }
        Command::Relay => {
            relay::run_relay(RelayConfig::from_env()?)?;
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::All
    } else {
        LevelFilter::MoreSevereEqual(Level::Info)
    };
    spdlog::default_logger().set_level_filter(level);
}
