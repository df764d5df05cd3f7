// src/main.rs
//! Quarry - CLI entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{GlobalArgs, InstallArgs};

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "Source-based package manager for native C/C++ libraries", long_about = None)]
struct Cli {
    /// Installation root directory
    #[arg(long, global = true, env = "QUARRY_ROOT", default_value = ".")]
    root: PathBuf,

    /// Default triplet for unqualified package specs
    #[arg(long, global = true, env = "QUARRY_DEFAULT_TRIPLET", default_value = "x86-windows")]
    triplet: String,

    /// Pass build tool output through instead of discarding it
    #[arg(long, global = true)]
    debug: bool,

    /// Enable the feature-aware planner and [feature] spec syntax
    #[arg(long = "feature-packages", global = true)]
    feature_packages: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and install packages
    Install {
        /// Package specs, e.g. zlib or zlib:x64-windows
        #[arg(required = true)]
        packages: Vec<String>,

        /// Show the plan without executing it
        #[arg(long)]
        dry_run: bool,

        /// Build from the upstream HEAD instead of the pinned version
        #[arg(long)]
        head: bool,

        /// Fail instead of downloading missing sources
        #[arg(long)]
        no_downloads: bool,

        /// Allow rebuilding already-installed packages
        #[arg(long)]
        recurse: bool,

        /// Continue past failing packages and summarize at the end
        #[arg(long)]
        keep_going: bool,
    },

    /// Remove installed packages
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,

        /// Also remove installed packages that depend on these
        #[arg(long)]
        recurse: bool,

        /// Show what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Build a single package whose dependencies are already installed
    Build {
        package: String,

        /// Re-run only the post-build checks against the existing sandbox
        #[arg(long)]
        checks_only: bool,
    },

    /// List installed packages
    List,

    /// Search the ports tree
    Search {
        /// Substring to match against names and descriptions
        pattern: Option<String>,
    },

    /// Show installed packages that differ from their ports
    Update,

    /// Show dependency lists of ports
    DependInfo {
        /// Limit output to these ports
        packages: Vec<String>,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let global = GlobalArgs {
        root: cli.root,
        default_triplet: cli.triplet,
        debug: cli.debug,
        feature_packages: cli.feature_packages,
    };

    match cli.command {
        Commands::Install { packages, dry_run, head, no_downloads, recurse, keep_going } => {
            commands::cmd_install(
                &global,
                &InstallArgs { packages, dry_run, head, no_downloads, recurse, keep_going },
            )
        }

        Commands::Remove { packages, recurse, dry_run } => {
            commands::cmd_remove(&global, &packages, recurse, dry_run)
        }

        Commands::Build { package, checks_only } => {
            commands::cmd_build(&global, &package, checks_only)
        }

        Commands::List => commands::cmd_list(&global),

        Commands::Search { pattern } => commands::cmd_search(&global, pattern.as_deref()),

        Commands::Update => commands::cmd_update(&global),

        Commands::DependInfo { packages } => commands::cmd_depend_info(&global, &packages),
    }
}
