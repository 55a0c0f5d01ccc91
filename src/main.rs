//! Process entry point: CLI parsing and wiring.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use httplb::{config::Config, node_service, observability, Algorithm, Gateway, HealthChecker, NodePool, Shutdown};

#[derive(Parser)]
#[command(name = "httplb", version, about = "HTTP load balancer with active health checking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the load balancer
    Balance {
        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Listen address, e.g. 0.0.0.0:8080
        #[arg(long)]
        listen: Option<String>,

        /// Selection algorithm: roundrobin or leastconnections
        #[arg(long)]
        algorithm: Option<Algorithm>,

        /// Comma-separated node base URLs
        #[arg(long, value_delimiter = ',')]
        nodes: Vec<String>,

        /// Health check interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run a demo backend node
    Node {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8081")]
        listen: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Balance {
            config,
            listen,
            algorithm,
            nodes,
            interval,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path)?,
                None => Config::default(),
            };
            if let Some(listen) = listen {
                config.listener.bind_address = listen;
            }
            if let Some(algorithm) = algorithm {
                config.algorithm = algorithm;
            }
            if !nodes.is_empty() {
                config.nodes = nodes;
            }
            if let Some(interval) = interval {
                config.health_check.interval_secs = interval;
            }

            observability::init_tracing(&config.observability.log_level);
            run_balancer(config).await
        }
        Commands::Node { listen } => {
            observability::init_tracing("httplb=info");
            node_service::run(&listen).await?;
            Ok(())
        }
    }
}

async fn run_balancer(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Configuration errors are fatal; the process never serves traffic.
    let addresses = config.validate()?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        algorithm = %config.algorithm,
        nodes = addresses.len(),
        interval_secs = config.health_check.interval_secs,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "failed to parse metrics address"
            ),
        }
    }

    let pool = Arc::new(NodePool::new(addresses, config.algorithm));
    let shutdown = Shutdown::new();

    let checker = HealthChecker::new(pool.clone(), &config.health_check);
    let checker_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        checker.run(checker_shutdown).await;
    });

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let gateway = Gateway::new(pool);
    let gateway_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        httplb::shutdown::on_ctrl_c(&shutdown).await;
    });

    gateway.run(listener, gateway_shutdown).await?;
    tracing::info!("shutdown complete");
    Ok(())
}
