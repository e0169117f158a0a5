//! Route selection across candidate paths and assembly of the final quote.

use num_traits::{FromPrimitive, ToPrimitive};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::data_management::pool_state::SwapData;
use crate::engine::graph::TokenGraph;
use crate::engine::pathfinder::Path;
use crate::engine::pricing::{price_hop, HopQuote};
use crate::types::{QuoterError, Result, Slippage};

/// A fully priced path, before aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteCandidate {
    pub path: Path,
    pub amount_in: f64,
    pub hops: Vec<HopQuote>,
}

impl RouteCandidate {
    /// Output of the last hop.
    pub fn amount_out(&self) -> f64 {
        self.hops.last().map_or(0.0, |h| h.amount_out)
    }
}

/// Thread `amount_in` through every hop of `path`, each hop's output feeding the next.
pub fn quote_path(path: &Path, swap_data: &SwapData, amount_in: f64, slippage: Slippage) -> Result<RouteCandidate> {
    if path.hop_count() == 0 {
        return Err(QuoterError::RouteNotFound {
            from: path.tokens.first().cloned().unwrap_or_default(),
            to: path.tokens.last().cloned().unwrap_or_default(),
        });
    }

    let mut hops = Vec::with_capacity(path.hop_count());
    let mut current = amount_in;
    for (token_in, token_out) in path.hops() {
        let state = swap_data.hop(token_in, token_out)?;
        let hop = price_hop(current, state, slippage)?;
        current = hop.amount_out;
        hops.push(hop);
    }

    Ok(RouteCandidate { path: path.clone(), amount_in, hops })
}

/// Price every candidate path and keep the one with the largest final output.
///
/// Paths are priced in parallel, but selection walks them in input order: a later path
/// replaces the running best only if its output is strictly larger, so ties keep the
/// earlier path. Paths whose pricing fails are dropped rather than scored as zero.
pub fn select_best_route(
    paths: &[Path],
    swap_data: &SwapData,
    amount_in: f64,
    slippage: Slippage,
) -> Result<RouteCandidate> {
    let priced: Vec<Result<RouteCandidate>> = paths
        .par_iter()
        .map(|path| quote_path(path, swap_data, amount_in, slippage))
        .collect();

    let mut best: Option<RouteCandidate> = None;
    for (path, result) in paths.iter().zip(priced) {
        match result {
            Ok(candidate) => {
                let better = best.as_ref().map_or(true, |b| candidate.amount_out() > b.amount_out());
                if better {
                    best = Some(candidate);
                }
            }
            Err(e) => debug!(path = %path, error = %e, "Rejected candidate path"),
        }
    }

    best.ok_or_else(|| {
        let tokens = paths.first().map(|p| p.tokens.as_slice()).unwrap_or_default();
        QuoterError::RouteNotFound {
            from: tokens.first().cloned().unwrap_or_default(),
            to: tokens.last().cloned().unwrap_or_default(),
        }
    })
}

/// Final quote handed to callers and to the transaction builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuote {
    pub path: Path,
    pub hops: Vec<HopQuote>,
    pub token_in_amount: f64,
    pub token_out_amount: f64,
    /// Per-hop minimum outputs, one per hop.
    pub minimum_out: Vec<f64>,
    pub final_minimum_out: f64,
    pub fee_perc: Vec<f64>,
    /// Sum of the per-hop fee percentages.
    pub final_fee_perc: f64,
    /// Sum of the per-hop price impacts.
    pub final_price_impact: f64,
    pub is_stable: Vec<bool>,
    pub exchange_rate: f64,
}

/// Aggregate a priced candidate into a [`RouteQuote`].
///
/// Fee percentages and price impacts are summed across hops, not compounded.
pub fn assemble(candidate: RouteCandidate) -> RouteQuote {
    let RouteCandidate { path, amount_in, hops } = candidate;
    let token_out_amount = hops.last().map_or(0.0, |h| h.amount_out);
    let minimum_out: Vec<f64> = hops.iter().map(|h| h.minimum_out).collect();
    let fee_perc: Vec<f64> = hops.iter().map(|h| h.fee_perc).collect();

    RouteQuote {
        final_minimum_out: minimum_out.last().copied().unwrap_or(0.0),
        final_fee_perc: fee_perc.iter().sum(),
        final_price_impact: hops.iter().map(|h| h.price_impact).sum(),
        is_stable: hops.iter().map(|h| h.pool_type.is_stable()).collect(),
        exchange_rate: token_out_amount / amount_in,
        path,
        token_in_amount: amount_in,
        token_out_amount,
        minimum_out,
        fee_perc,
        hops,
    }
}

/// What a transaction builder needs to execute a quote, in raw token units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapPlan {
    pub path: Vec<String>,
    pub amount_in_raw: u128,
    pub minimum_out_raw: Vec<u128>,
}

impl RouteQuote {
    pub fn token_in(&self) -> &str {
        self.path.tokens.first().map_or("", String::as_str)
    }

    pub fn token_out(&self) -> &str {
        self.path.tokens.last().map_or("", String::as_str)
    }

    /// Convert the quote's amounts to raw units using each token's decimals.
    pub fn swap_plan(&self, graph: &TokenGraph) -> Result<SwapPlan> {
        let decimals = |symbol: &str| -> Result<u32> {
            graph
                .token(symbol)
                .map(|t| t.decimals)
                .ok_or_else(|| QuoterError::UnknownToken(symbol.to_string()))
        };

        let amount_in_raw = to_raw(self.token_in_amount, decimals(self.token_in())?)?;
        let minimum_out_raw = self
            .path
            .tokens
            .iter()
            .skip(1)
            .zip(&self.minimum_out)
            .map(|(symbol, &amount)| to_raw(amount, decimals(symbol.as_str())?))
            .collect::<Result<Vec<_>>>()?;

        Ok(SwapPlan { path: self.path.tokens.clone(), amount_in_raw, minimum_out_raw })
    }
}

/// `amount * 10^decimals`, truncated.
fn to_raw(amount: f64, decimals: u32) -> Result<u128> {
    let invalid = || QuoterError::InvalidAmount(amount);
    let value = Decimal::from_f64(amount).ok_or_else(invalid)?;
    let scale = Decimal::from_u64(10u64.checked_pow(decimals).ok_or_else(invalid)?).ok_or_else(invalid)?;
    value.checked_mul(scale).ok_or_else(invalid)?.trunc().to_u128().ok_or_else(invalid)
}
