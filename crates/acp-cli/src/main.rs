use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::ClientArgs;

#[derive(Parser)]
#[command(name = "acp")]
#[command(about = "Provision App Center applications from a declarative config", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every missing application variant and repository binding
    Reconcile {
        /// Config paths in merge order (later files override earlier ones)
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Variant groups converged in parallel (1 = strictly in order)
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Abort the whole run after this many seconds
        #[arg(long = "deadline-secs")]
        deadline_secs: Option<u64>,

        /// Print the run report as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Show what `reconcile` would create, using reads only
    Plan {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// List the organization's users
    Users {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Compute layered config hash + print the merged document (token redacted)
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the resolved configuration after environment overlay
    ConfigShow {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent when absent; deployments inject env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Reconcile {
            config_paths,
            concurrency,
            deadline_secs,
            json,
            client,
        } => {
            commands::reconcile::run_reconcile(config_paths, concurrency, deadline_secs, json, client)
                .await?
        }

        Commands::Plan {
            config_paths,
            json,
            client,
        } => commands::reconcile::run_plan(config_paths, json, client).await?,

        Commands::Users {
            config_paths,
            client,
        } => commands::inspect::users(config_paths, client).await?,

        Commands::ConfigHash { paths } => commands::inspect::config_hash(paths)?,

        Commands::ConfigShow { config_paths } => commands::inspect::config_show(config_paths)?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
