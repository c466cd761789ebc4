//! hostroute
//!
//! Maps hostnames to local backends inside a running proxy's admin API and
//! keeps a local registry of what it configured.
//!
//! ```text
//! hostroute add    --host feature-x.app.localhost --frontend 3001 --backend 3002
//! hostroute add    --host feature-x.app.localhost --backend 4000
//! hostroute remove --host feature-x.app.localhost
//! hostroute list
//! hostroute ports  --count 2
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;

use hostroute::admin::AdminClient;
use hostroute::config::loader::process_env;
use hostroute::config::paths::resolve_state_dir;
use hostroute::config::{resolve_config, HostrouteConfig, Overrides};
use hostroute::lifecycle::CaddyProcess;
use hostroute::observability::{command_span, init_logging};
use hostroute::reconcile::{
    ProxyShutdown, ReconcileError, Reconciler, RemoveRequest, UpsertAction, UpsertRequest,
};
use hostroute::state::{LockOptions, Registry};

#[derive(Parser)]
#[command(name = "hostroute", version)]
#[command(about = "Map hostnames to local backends through a proxy's admin API", long_about = None)]
struct Cli {
    /// TOML config file (also HOSTROUTE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where to find the proxy and the local state.
#[derive(Args, Default)]
struct TargetArgs {
    /// Admin API base URL, http://host:port or unix:///path (also HOSTROUTE_ADMIN)
    #[arg(long)]
    admin: Option<String>,

    /// Proxy HTTP server name; auto-detected when unset (also HOSTROUTE_SERVER)
    #[arg(long)]
    server: Option<String>,

    /// State directory; resolved per platform when unset (also HOSTROUTE_STATE_DIR)
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or replace the route for a host
    Add {
        /// Fully-qualified host (e.g. feature-x.app.localhost)
        #[arg(long)]
        host: String,

        /// Default traffic target: port or host:port (required)
        #[arg(long)]
        backend: Option<String>,

        /// WebSocket-upgrade target: port or host:port (requires --backend)
        #[arg(long)]
        frontend: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Remove the route for a host
    Remove {
        #[arg(long)]
        host: String,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// List registered hosts
    List {
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Print the registry as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print free local TCP ports
    Ports {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Add { .. } => "add",
            Commands::Remove { .. } => "remove",
            Commands::List { .. } => "list",
            Commands::Ports { .. } => "ports",
        }
    }

    fn overrides(&self, config_path: Option<PathBuf>) -> Overrides {
        let (target, state_dir) = match self {
            Commands::Add { target, .. } | Commands::Remove { target, .. } => {
                (Some(target), target.state_dir.clone())
            }
            Commands::List { state_dir, .. } => (None, state_dir.clone()),
            Commands::Ports { .. } => (None, None),
        };
        Overrides {
            config_path,
            admin_url: target.and_then(|t| t.admin.clone()),
            server: target.and_then(|t| t.server.clone()),
            state_dir,
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult {
    let config = resolve_config(&cli.command.overrides(cli.config.clone()), process_env)?;
    init_logging(&config.observability.log_level, cli.verbose);

    let span = command_span(cli.command.name());
    dispatch(cli.command, config).instrument(span).await
}

async fn dispatch(command: Commands, config: HostrouteConfig) -> CliResult {
    match command {
        Commands::Add {
            host,
            backend,
            frontend,
            ..
        } => {
            let request = UpsertRequest {
                host,
                backend,
                frontend,
                server: config.admin.server.clone(),
            };
            let outcome = reconciler(&config)?.upsert(&request).await?;
            match outcome.action {
                UpsertAction::Created => {
                    println!("Added route for {} on server {}", request.host, outcome.server)
                }
                UpsertAction::Updated { index } => println!(
                    "Updated route for {} on server {} (index {})",
                    request.host, outcome.server, index
                ),
            }
        }
        Commands::Remove { host, .. } => {
            let request = RemoveRequest {
                host,
                server: config.admin.server.clone(),
            };
            let outcome = reconciler(&config)?.remove(&request).await?;
            match outcome.removed_index {
                Some(index) => println!(
                    "Removed route for {} (index {}) from server {}",
                    outcome.host, index, outcome.server
                ),
                None => println!(
                    "No route found for {} on server {} (nothing to remove)",
                    outcome.host, outcome.server
                ),
            }
            if outcome.proxy == ProxyShutdown::Stopped {
                println!("Stopped proxy (no hosts remaining)");
            }
        }
        Commands::List { json, .. } => {
            let registry = reconciler(&config)?.list()?;
            if json {
                println!("{}", registry.to_json()?);
            } else {
                print_registry(&registry);
            }
        }
        Commands::Ports { count } => {
            if count < 1 {
                return Err(ReconcileError::InvalidInput("--count must be >= 1".into()).into());
            }
            let ports = hostroute::net::free_ports(count).await?;
            let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
            println!("{}", ports.join(" "));
        }
    }
    Ok(())
}

fn reconciler(
    config: &HostrouteConfig,
) -> Result<Reconciler<AdminClient, CaddyProcess>, Box<dyn std::error::Error>> {
    let state_dir = resolve_state_dir(config.state.dir.as_deref(), process_env);
    tracing::debug!(state_dir = %state_dir.display(), admin = %config.admin.url, "Resolved targets");

    let client = AdminClient::from_config(&config.admin)?;
    Ok(Reconciler::new(client, CaddyProcess::from_config(&config.proxy), state_dir)
        .with_lock_options(LockOptions::from(&config.state))
        .with_stop_when_empty(config.proxy.stop_when_empty))
}

fn print_registry(registry: &Registry) {
    if registry.is_empty() {
        println!("No hosts registered.");
        return;
    }
    for entry in registry.entries() {
        let mut line = format!("{} -> {} (server={}", entry.host, entry.backend, entry.server);
        if let Some(frontend) = &entry.frontend {
            line.push_str(&format!(", frontend={}", frontend));
        }
        line.push_str(&format!(", updated={})", entry.updated.to_rfc3339()));
        println!("{}", line);
    }
}
