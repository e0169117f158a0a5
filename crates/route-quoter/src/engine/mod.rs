pub mod graph;
pub mod pathfinder;
pub mod pricing;
pub mod quoting;

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::data_management::cache::{CacheMetrics, PathCache, PathCacheKey};
use crate::data_management::pool_state::{ChainStateProvider, PoolStateLoader};
use crate::types::{QuoteRequest, QuoterError, Result, Slippage};
use graph::TokenGraph;
use pathfinder::{Path, Pathfinder};
use quoting::{assemble, select_best_route, RouteQuote};

/// The main price engine struct.
///
/// Owns the immutable token graph, the chain-state collaborator and a path cache. Each
/// call to [`PriceEngine::quote`] fetches fresh pool states; nothing but enumerated paths
/// survives between quotes.
pub struct PriceEngine<P: ChainStateProvider> {
    pub graph: Arc<TokenGraph>,
    pub provider: Arc<P>,
    pub config: AppConfig,
    cache: Mutex<PathCache>,
}

impl<P: ChainStateProvider> PriceEngine<P> {
    pub fn new(graph: Arc<TokenGraph>, provider: Arc<P>, config: AppConfig) -> Self {
        let cache = Mutex::new(PathCache::new(config.path_cache_capacity));
        Self { graph, provider, config, cache }
    }

    /// Quote the best route for `request`.
    ///
    /// All-or-nothing: on timeout the in-flight fetches are dropped and no partial quote
    /// is returned.
    pub async fn quote(&self, request: &QuoteRequest) -> Result<RouteQuote> {
        if !request.amount_in.is_finite() || request.amount_in <= 0.0 {
            return Err(QuoterError::InvalidAmount(request.amount_in));
        }
        for symbol in [&request.token_in, &request.token_out] {
            if !self.graph.contains_token(symbol) {
                return Err(QuoterError::UnknownToken(symbol.clone()));
            }
        }

        let slippage = request
            .slippage
            .unwrap_or(Slippage::ZERO)
            .or_default(self.config.default_slippage);
        let allow_multihop = request.allow_multihop.unwrap_or(self.config.allow_multihop);
        let max_hops = request.max_hops.unwrap_or(self.config.max_hops);

        let paths = self.paths(&request.token_in, &request.token_out, allow_multihop, max_hops);
        if paths.is_empty() {
            return Err(QuoterError::NoPathFound {
                from: request.token_in.clone(),
                to: request.token_out.clone(),
                max_hops: if allow_multihop { max_hops } else { 1 },
            });
        }

        let loader = PoolStateLoader::new(&self.graph, self.provider.as_ref(), self.config.max_concurrent_fetches);
        let swap_data = tokio::time::timeout(self.config.quote_timeout, loader.load_for_paths(&paths))
            .await
            .map_err(|_| QuoterError::Timeout(self.config.quote_timeout))?;

        // Pricing fans out on rayon; keep it off the async worker.
        let candidates = paths.len();
        let amount_in = request.amount_in;
        let best = tokio::task::spawn_blocking(move || select_best_route(&paths, &swap_data, amount_in, slippage))
            .await
            .map_err(|e| QuoterError::Selection(e.to_string()))??;
        let quote = assemble(best);
        info!(
            route = %quote.path,
            amount_in = quote.token_in_amount,
            amount_out = quote.token_out_amount,
            candidates,
            "Quote computed"
        );
        Ok(quote)
    }

    /// Enumerate paths, served from the cache when the same search ran before.
    pub fn paths(&self, source: &str, destination: &str, allow_multihop: bool, max_hops: usize) -> Vec<Path> {
        let key = PathCacheKey::new(source, destination, allow_multihop, max_hops);
        if let Some(paths) = self.lock_cache().get(&key) {
            debug!(source, destination, "Path cache hit");
            return paths.clone();
        }

        let paths = Pathfinder::new(&self.graph).enumerate_paths(source, destination, allow_multihop, max_hops);
        self.lock_cache().insert(key, paths.clone());
        paths
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.lock_cache().metrics()
    }

    fn lock_cache(&self) -> MutexGuard<'_, PathCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}
