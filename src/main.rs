use clap::Parser;
use eth_block_scanner::api::{ApiServer, AppState};
use eth_block_scanner::blockchain::{BlockObserver, BlockParser, RpcClient};
use eth_block_scanner::config::AppConfig;
use eth_block_scanner::logging::init_logging;
use eth_block_scanner::storage::{InMemorySubscriptions, InMemoryTransactionHistory};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "scanner")]
#[command(about = "Ethereum address transaction scanner with a subscription poller")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file (defaults to $CONFIG_FILE or ./config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Ethereum JSON-RPC endpoint, overrides the configured one
    #[arg(long)]
    ethereum_host: Option<String>,

    /// HTTP port, overrides the configured one
    #[arg(long)]
    port: Option<u16>,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", AppConfig::generate_sample_config()?);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(endpoint) = args.ethereum_host {
        config.rpc.endpoint = endpoint;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    // Validated once every source of configuration has been applied
    config.validate()?;

    init_logging(&config.logging)?;
    info!("Starting eth-block-scanner against {}", config.rpc.endpoint);

    let client = Arc::new(RpcClient::new(&config.rpc.endpoint, config.rpc.timeout_seconds)?);
    let history = Arc::new(InMemoryTransactionHistory::new());
    let subscriptions = Arc::new(InMemorySubscriptions::new());
    let parser = Arc::new(BlockParser::new(client, history, subscriptions.clone()));

    let shutdown = CancellationToken::new();

    let observer_handle = if config.observer.enabled {
        let observer =
            BlockObserver::from_config(parser.clone(), subscriptions.clone(), &config.observer);
        let (handle, mut errors) = observer.spawn(shutdown.clone());

        // Tick failures are logged by the observer itself; keep a running count
        tokio::spawn(async move {
            let mut failed_ticks: u64 = 0;
            while let Some(e) = errors.recv().await {
                failed_ticks += 1;
                debug!("Observer tick failed ({} so far): {}", failed_ticks, e);
            }
        });

        Some(handle)
    } else {
        warn!("Block observer disabled by configuration");
        None
    };

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Unable to listen for shutdown signal: {}", e),
        }
        signal_token.cancel();
    });

    let state = AppState {
        parser,
        subscriptions,
        shutdown: shutdown.clone(),
        request_timeout: config.api.request_timeout(),
        default_block_range: config.scanner.default_block_range,
    };

    let server_result = ApiServer::new(state, config.api.bind_address()).start().await;

    // The server also returns on bind failure; make sure the observer stops either way
    shutdown.cancel();
    if let Some(handle) = observer_handle {
        if let Err(e) = handle.await {
            error!("Block observer task failed: {}", e);
        }
    }

    if let Err(e) = server_result {
        error!("Server failed: {}", e);
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}
