//! Pool state snapshots: the chain-state collaborator contract, normalization of raw
//! on-chain values, and the per-quote memo table of fetched states.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::graph::TokenGraph;
use crate::engine::pathfinder::Path;
use crate::registry::{Pool, PoolType};
use crate::types::{QuoterError, Result};

/// Peg targets are published as Q48 fixed-point numbers.
const PEG_TARGET_SCALE: f64 = 281_474_976_710_656.0; // 2^48

/// Raw pool values as reported by the chain, oriented to the requested direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPoolState {
    pub reserve_in: u128,
    pub reserve_out: u128,
    /// Fee denominator `d`: the pool charges `1/d` of each trade.
    pub lp_fee: u128,
    pub lp_supply: u128,
    /// Q48 fixed-point peg target, pegged-hybrid pools only.
    #[serde(default)]
    pub peg_target: Option<u128>,
}

/// External collaborator that reads pool storage from the ledger.
#[async_trait]
pub trait ChainStateProvider: Send + Sync {
    async fn fetch_pool_state(
        &self,
        pool_address: &str,
        token_in: &str,
        token_out: &str,
    ) -> anyhow::Result<RawPoolState>;
}

/// Which side of a pegged-hybrid hop is the pegged asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PegSide {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PegTarget {
    /// Value of one pegged token in units of the base token.
    pub ratio: f64,
    pub side: PegSide,
}

/// Point-in-time pool snapshot in human units. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolState {
    pub pool_type: PoolType,
    pub token_in: String,
    pub token_out: String,
    pub reserve_in: f64,
    pub reserve_out: f64,
    /// Fraction of each trade kept by the pool.
    pub fee: f64,
    pub lp_supply: f64,
    /// Factors mapping human amounts onto the stable curve's common basis.
    pub precision_in: Option<f64>,
    pub precision_out: Option<f64>,
    pub peg: Option<PegTarget>,
    /// Output amounts are truncated to this many decimals.
    pub decimals_out: u32,
}

impl PoolState {
    /// Constant-product snapshot, mostly for tests and simulations.
    pub fn volatile(token_in: &str, token_out: &str, reserve_in: f64, reserve_out: f64, fee: f64) -> Self {
        Self {
            pool_type: PoolType::Volatile,
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            reserve_in,
            reserve_out,
            fee,
            lp_supply: 0.0,
            precision_in: None,
            precision_out: None,
            peg: None,
            decimals_out: 6,
        }
    }

    pub fn with_precision(mut self, precision_in: f64, precision_out: f64) -> Self {
        self.precision_in = Some(precision_in);
        self.precision_out = Some(precision_out);
        self
    }

    pub fn with_peg(mut self, ratio: f64, side: PegSide) -> Self {
        self.peg = Some(PegTarget { ratio, side });
        self
    }

    pub fn with_pool_type(mut self, pool_type: PoolType) -> Self {
        self.pool_type = pool_type;
        self
    }

    pub fn with_decimals_out(mut self, decimals: u32) -> Self {
        self.decimals_out = decimals;
        self
    }
}

/// `raw / 10^decimals` as f64.
///
/// Exact through [`Decimal`] while the value fits its 96-bit mantissa and 28-digit scale;
/// larger reserves fall back to float division.
pub fn to_human(raw: u128, decimals: u32) -> Option<f64> {
    let exact = i128::try_from(raw)
        .ok()
        .and_then(|r| Decimal::try_from_i128_with_scale(r, decimals).ok());
    if let Some(value) = exact {
        return value.to_f64();
    }
    let human = raw as f64 / 10f64.powi(i32::try_from(decimals).ok()?);
    human.is_finite().then_some(human)
}

/// Memoized pool states for one route computation, keyed by directed pair.
#[derive(Debug, Default, Clone)]
pub struct SwapData {
    states: HashMap<(String, String), std::result::Result<Arc<PoolState>, QuoterError>>,
}

impl SwapData {
    pub fn insert(&mut self, token_in: &str, token_out: &str, state: Result<PoolState>) {
        self.states
            .insert((token_in.to_string(), token_out.to_string()), state.map(Arc::new));
    }

    pub fn hop(&self, token_in: &str, token_out: &str) -> Result<&PoolState> {
        match self.states.get(&(token_in.to_string(), token_out.to_string())) {
            Some(Ok(state)) => Ok(state.as_ref()),
            Some(Err(e)) => Err(e.clone()),
            None => Err(QuoterError::unavailable(token_in, token_out, "state was not loaded")),
        }
    }

    /// States for every hop of `path`, or the first hop's failure.
    pub fn for_path(&self, path: &Path) -> Result<Vec<&PoolState>> {
        path.hops().map(|(a, b)| self.hop(a, b)).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Loads and normalizes pool states through a [`ChainStateProvider`].
pub struct PoolStateLoader<'a, P: ChainStateProvider + ?Sized> {
    graph: &'a TokenGraph,
    provider: &'a P,
    max_concurrent_fetches: usize,
}

impl<'a, P: ChainStateProvider + ?Sized> PoolStateLoader<'a, P> {
    pub fn new(graph: &'a TokenGraph, provider: &'a P, max_concurrent_fetches: usize) -> Self {
        Self { graph, provider, max_concurrent_fetches: max_concurrent_fetches.max(1) }
    }

    /// Fetch every distinct directed hop used by `paths` exactly once.
    ///
    /// Fetches for different pairs run concurrently. A failed pair is recorded in the
    /// table and only affects the paths that use it.
    pub async fn load_for_paths(&self, paths: &[Path]) -> SwapData {
        let pairs: IndexSet<(&str, &str)> = paths.iter().flat_map(|p| p.hops()).collect();
        debug!(paths = paths.len(), unique_pairs = pairs.len(), "Loading pool states");

        let fetches: Vec<_> = pairs.into_iter().map(|(token_in, token_out)| self.load_pair(token_in, token_out)).collect();
        let results: Vec<_> = stream::iter(fetches)
            .buffered(self.max_concurrent_fetches)
            .collect()
            .await;

        let mut swap_data = SwapData::default();
        for (token_in, token_out, state) in results {
            if let Err(e) = &state {
                warn!(token_in, token_out, error = %e, "Pool state unavailable");
            }
            swap_data.insert(token_in, token_out, state);
        }
        swap_data
    }

    async fn load_pair<'p>(&self, token_in: &'p str, token_out: &'p str) -> (&'p str, &'p str, Result<PoolState>) {
        (token_in, token_out, self.load_state(token_in, token_out).await)
    }

    /// Fetch and normalize the state of the pool trading `token_in` for `token_out`.
    pub async fn load_state(&self, token_in: &str, token_out: &str) -> Result<PoolState> {
        let pool = self
            .graph
            .pool(token_in, token_out)
            .ok_or_else(|| QuoterError::unavailable(token_in, token_out, "no pool for pair"))?;
        let raw = self
            .provider
            .fetch_pool_state(&pool.address, token_in, token_out)
            .await
            .map_err(|e| QuoterError::unavailable(token_in, token_out, format!("{:#}", e)))?;
        self.normalize(pool, token_in, token_out, &raw)
    }

    /// Convert raw chain values into a [`PoolState`], rejecting unusable pools.
    pub fn normalize(&self, pool: &Pool, token_in: &str, token_out: &str, raw: &RawPoolState) -> Result<PoolState> {
        let unavailable = |reason: &str| QuoterError::unavailable(token_in, token_out, reason);
        let tok_in = self.graph.token(token_in).ok_or_else(|| QuoterError::UnknownToken(token_in.into()))?;
        let tok_out = self.graph.token(token_out).ok_or_else(|| QuoterError::UnknownToken(token_out.into()))?;

        if raw.reserve_in == 0 || raw.reserve_out == 0 {
            return Err(unavailable("pool has no liquidity"));
        }
        if raw.lp_fee == 0 {
            return Err(unavailable("pool reports a zero fee denominator"));
        }

        let reserve_in = to_human(raw.reserve_in, tok_in.decimals).ok_or_else(|| unavailable("reserve out of range"))?;
        let reserve_out = to_human(raw.reserve_out, tok_out.decimals).ok_or_else(|| unavailable("reserve out of range"))?;
        let lp_supply = to_human(raw.lp_supply, pool.lp_token.decimals).ok_or_else(|| unavailable("lp supply out of range"))?;
        let fee = 1.0 / raw.lp_fee as f64;

        let (precision_in, precision_out) = match pool.pool_type {
            PoolType::GeneralizedStable => (
                common_basis(pool.precision_of(token_in), tok_in.decimals),
                common_basis(pool.precision_of(token_out), tok_out.decimals),
            ),
            _ => (None, None),
        };

        let peg = match pool.pool_type {
            PoolType::PeggedHybrid => {
                let target = raw.peg_target.ok_or_else(|| unavailable("peg target missing"))?;
                if target == 0 {
                    return Err(unavailable("peg target is zero"));
                }
                let pegged = pool.pegged_token.as_deref().ok_or_else(|| unavailable("pegged token not configured"))?;
                let side = if pegged == token_in { PegSide::Input } else { PegSide::Output };
                Some(PegTarget { ratio: target as f64 / PEG_TARGET_SCALE, side })
            }
            _ => None,
        };

        Ok(PoolState {
            pool_type: pool.pool_type,
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            reserve_in,
            reserve_out,
            fee,
            lp_supply,
            precision_in,
            precision_out,
            peg,
            decimals_out: tok_out.decimals,
        })
    }
}

/// Raw-unit precision multiplier lifted to human units: `precision * 10^decimals`.
fn common_basis(precision: Option<Decimal>, decimals: u32) -> Option<f64> {
    let precision = precision?.to_f64()?;
    if precision <= 0.0 {
        return None;
    }
    Some(precision * 10f64.powi(decimals as i32))
}
