mod cli;
mod snapshot;

use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use route_quoter::config::CliConfig;
use route_quoter::{AppConfig, PoolRegistry, PriceEngine, QuoteRequest, TokenGraph};
use tracing::info;
use tracing_subscriber::EnvFilter;

use snapshot::SnapshotProvider;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Flags win over the config file, which wins over env vars.
    let config = AppConfig::from_cli(CliConfig::parse())?;

    let registry_file = config.registry_file.clone().ok_or_else(|| anyhow!("--registry-file is required"))?;
    let pool_states_file = config
        .pool_states_file
        .clone()
        .ok_or_else(|| anyhow!("--pool-states-file is required"))?;
    let sell_token = config.sell_token.clone().ok_or_else(|| anyhow!("--sell-token is required"))?;
    let buy_token = config.buy_token.clone().ok_or_else(|| anyhow!("--buy-token is required"))?;
    let sell_amount = config.sell_amount.ok_or_else(|| anyhow!("--sell-amount is required"))?;

    let feed = fs::read_to_string(&registry_file).with_context(|| format!("reading registry from {}", registry_file))?;
    let registry = PoolRegistry::from_json_str(&feed, &config.deny_list, &config.pegged_pairs)?;
    let graph = Arc::new(TokenGraph::new(registry));
    let provider = Arc::new(SnapshotProvider::from_file(&pool_states_file)?);
    info!(
        tokens = graph.get_node_count(),
        pools = graph.get_edge_count(),
        snapshots = provider.len(),
        "Loaded registry and pool states"
    );

    let mut request = QuoteRequest::new(sell_token, buy_token, sell_amount);
    if let Some(slippage) = config.slippage {
        request = request.with_slippage(slippage);
    }
    println!("Quoting for: {} {} -> {}", sell_amount, request.token_in, request.token_out);

    let engine = PriceEngine::new(graph.clone(), provider, config);
    let quote = engine.quote(&request).await?;
    cli::print_quote(&quote, &graph);

    Ok(())
}
