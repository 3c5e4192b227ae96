//! CLI hook runner for the advisory manager
//!
//! Wire this binary into the host's lifecycle scripts, e.g.:
//!
//! ```json
//! "scripts": {
//!     "pre-install-cmd": "advisory-hook hook pre-install",
//!     "post-update-cmd": "advisory-hook hook post-update"
//! }
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use composer_advisory_manager::{
    AdvisoryReconciler, CommandAuditProvider, ConsoleSink, JsonConfigStore, LifecycleEvent,
};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "advisory-hook")]
#[command(about = "Keep dependency installs unblocked by security advisories", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the project manifest holding the config.audit section
    #[arg(short = 'm', long, default_value = "composer.json")]
    manifest: PathBuf,

    /// Dependency-manager executable whose audit subcommand is run
    #[arg(short = 't', long, default_value = "composer")]
    tool: String,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the handlers registered for one lifecycle event
    Hook {
        /// Lifecycle event name (e.g. pre-install, post-update)
        event: LifecycleEvent,
    },

    /// Print the event-to-handler dispatch table
    Subscriptions,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Hook { event } => {
            if let Err(e) = run_hook(&cli, event) {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
                process::exit(1);
            }
        }

        Commands::Subscriptions => {
            for event in LifecycleEvent::ALL {
                let actions: Vec<String> =
                    event.actions().iter().map(ToString::to_string).collect();
                let rendered = if actions.is_empty() {
                    "(none)".to_string()
                } else {
                    actions.join(", ")
                };
                println!("{:<13} {}", event.name(), rendered);
            }
        }
    }
}

fn run_hook(cli: &Cli, event: LifecycleEvent) -> anyhow::Result<()> {
    let mut store = JsonConfigStore::load(&cli.manifest)
        .with_context(|| format!("failed to load manifest {}", cli.manifest.display()))?;
    let mut sink = ConsoleSink;

    // Handlers never fail the hook: every reconciler error degrades to a
    // sink message so the host's install/update continues.
    let mut reconciler = AdvisoryReconciler::new(CommandAuditProvider::new(cli.tool.as_str()));
    reconciler.handle(event, &mut store, &mut sink);

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
