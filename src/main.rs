//! Thin CLI over the ingestion and lookup engine. HTTP/WebSocket surfaces,
//! rate limiting, and cron triggering live outside this core (spec §1) —
//! this binary exists so an operator can run an update or check a single IP
//! by hand.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ip_denylist_core::config::Config;
use ip_denylist_core::context::Context;
use ip_denylist_core::{coordinator, health, lookup, plugins};

#[derive(Parser)]
#[command(author, version, about = "IPv4 denylist/allowlist/cloud-range ingestion and lookup engine", long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, value_name = "FILE", env = "CORE_CONFIG_PATH", default_value = "config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "CORE_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion cycle immediately and exit.
    Update,
    /// Run the coordinator's startup-then-cron scheduling loop.
    Serve,
    /// Look up a single IPv4 address.
    Lookup {
        ip: String,
        /// Also consult the configured external DNSBL provider.
        #[arg(long)]
        dnsbl: bool,
    },
    /// Print the health surface as JSON.
    Health,
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = Config::load(&cli.config)?;
    let ctx = Context::connect(config).await?;

    match cli.command {
        Commands::Update => {
            let plugins = plugins::build_plugins(&ctx.config);
            let report = coordinator::run_update(&ctx, &plugins).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Serve => {
            let config_for_schedule = ctx.config.clone();
            let plugins = plugins::build_plugins(&ctx.config);
            coordinator::schedule_loop(ctx, plugins, &config_for_schedule.update.cron, &config_for_schedule.update.timezone).await?;
        }
        Commands::Lookup { ip, dnsbl } => match lookup::lookup(&ctx, &ip, dnsbl).await {
            Ok(lookup::LookupOutcome::Found(payload)) => println!("{}", serde_json::to_string_pretty(&payload)?),
            Ok(lookup::LookupOutcome::NotFound) => {
                println!("not found");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("invalid: {e}");
                std::process::exit(2);
            }
        },
        Commands::Health => {
            let report = health::report(&ctx).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
