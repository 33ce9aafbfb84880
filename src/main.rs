//! govm Mining Client - Main Application
//!
//! Wires the template feed, the template store, the search workers, and the
//! submitter together and runs them until interrupted.

use govm_mining_client::{
    config::{Cli, Config},
    crypto::Signer,
    feed::TemplateFeed,
    store::TemplateStore,
    submit::Submitter,
    wallet::Wallet,
    worker, Result, APP_NAME, APP_VERSION,
};

use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_key {
        generate_key();
        return Ok(());
    }

    let mut config = Config::load(&cli.config_file)?;
    if let Some(verbosity) = cli.verbosity {
        config.verbosity = verbosity;
    }

    if cli.print_config {
        // The resolved configuration, defaults filled in.
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    info!("{} v{}", APP_NAME, APP_VERSION);
    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let signer = Arc::new(Signer::new());

    let primary = Wallet::load_or_create(Path::new(&config.wallet_file), &signer)?;
    let secondary = match &config.secondary_wallet_file {
        Some(path) => Wallet::load_or_create(Path::new(path), &signer)?,
        None => primary,
    };
    info!(address = %primary.address, "mining as primary account");
    if secondary.address != primary.address {
        info!(address = %secondary.address, "secondary account loaded");
    }

    let store = Arc::new(TemplateStore::new());
    let submitter = Submitter::new();

    let feed = TemplateFeed::new(Arc::clone(&store), Arc::clone(&signer), primary, secondary);
    feed.spawn(
        &config.chains,
        &config.servers,
        config.connections_per_chain(),
    );

    info!(
        chains = config.chains.len(),
        threads = config.effective_threads(),
        batch = config.increment(),
        "starting search workers"
    );
    worker::spawn_workers(&config, Arc::clone(&store), signer, submitter);

    tokio::spawn(report_stats(store));

    tokio::signal::ctrl_c()
        .await
        .map_err(govm_mining_client::Error::Io)?;
    info!("interrupt received, shutting down");
    Ok(())
}

/// Periodic status line: trailing-window hash rate, candidate and
/// confirmation counts, and the latest index seen per chain.
async fn report_stats(store: Arc<TemplateStore>) {
    let mut ticker = interval(Duration::from_secs(60));
    ticker.tick().await; // immediate first tick carries no data
    loop {
        ticker.tick().await;
        let snapshot = store.snapshot();
        let chains: Vec<String> = store
            .chains()
            .iter()
            .map(|(chain, index)| format!("{chain}:{index}"))
            .collect();
        info!(
            hash_rate = snapshot.hash_rate,
            candidates = snapshot.candidates,
            confirmed = snapshot.confirmed,
            confirmation_rate = snapshot.confirmation_rate,
            chains = %chains.join(" "),
            "mining status"
        );
    }
}

fn generate_key() {
    let signer = Signer::new();
    let wallet = Wallet::generate(&signer);
    println!("address:     {}", wallet.address);
    println!("private key: {}", hex::encode(wallet.key.secret_bytes()));
}
