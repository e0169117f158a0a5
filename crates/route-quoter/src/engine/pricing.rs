//! Per-hop pricing for each pool type.
//!
//! Every function here is pure: the same input amount, pool snapshot and tolerance always
//! produce the same [`HopQuote`]. Unusable parameters yield an error, never a zero quote.

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::data_management::pool_state::{PegSide, PoolState};
use crate::registry::PoolType;
use crate::types::{QuoterError, Result, Slippage};

/// Result of pricing one hop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HopQuote {
    pub token_in: String,
    pub token_out: String,
    pub pool_type: PoolType,
    pub amount_in: f64,
    pub amount_out: f64,
    /// Fee charged by the pool, in input units for volatile pools and output units otherwise.
    pub fee: f64,
    /// Pool fee as a percentage of the trade.
    pub fee_perc: f64,
    /// Percentage shortfall of the realized rate against the marginal rate.
    pub price_impact: f64,
    pub minimum_out: f64,
}

/// Price `amount_in` through the pool described by `state`.
pub fn price_hop(amount_in: f64, state: &PoolState, slippage: Slippage) -> Result<HopQuote> {
    if !amount_in.is_finite() || amount_in <= 0.0 {
        return Err(QuoterError::InvalidAmount(amount_in));
    }
    check_common(state)?;

    let swap = match state.pool_type {
        PoolType::Volatile => price_volatile(amount_in, state),
        PoolType::GeneralizedStable => price_stable(amount_in, state),
        PoolType::PeggedHybrid => price_pegged(amount_in, state),
    }?;

    let amount_out = round_down(swap.amount_out, state.decimals_out);
    if amount_out <= 0.0 {
        return Err(QuoterError::invalid_pool(state.pool_type, "trade produces no output"));
    }
    let minimum_out = round_down(slippage.apply(amount_out), state.decimals_out);
    let realized = swap.amount_out / amount_in;
    let price_impact = ((swap.marginal_rate - realized) / swap.marginal_rate * 100.0).max(0.0);

    Ok(HopQuote {
        token_in: state.token_in.clone(),
        token_out: state.token_out.clone(),
        pool_type: state.pool_type,
        amount_in,
        amount_out,
        fee: swap.fee,
        fee_perc: state.fee * 100.0,
        price_impact,
        minimum_out,
    })
}

/// Unrounded curve output together with the pool's marginal rate before the trade.
#[derive(Debug, Clone, Copy)]
struct Swap {
    amount_out: f64,
    fee: f64,
    marginal_rate: f64,
}

fn check_common(state: &PoolState) -> Result<()> {
    let pool_type = state.pool_type;
    if !(state.reserve_in.is_finite() && state.reserve_in > 0.0)
        || !(state.reserve_out.is_finite() && state.reserve_out > 0.0)
    {
        return Err(QuoterError::invalid_pool(pool_type, "reserves must be positive"));
    }
    if !state.fee.is_finite() || !(0.0..1.0).contains(&state.fee) {
        return Err(QuoterError::invalid_pool(pool_type, format!("fee {} outside [0, 1)", state.fee)));
    }
    Ok(())
}

/// Constant product: `(R_in + in') * (R_out - out) = R_in * R_out` with `in' = in * (1 - fee)`.
fn price_volatile(amount_in: f64, state: &PoolState) -> Result<Swap> {
    let net_in = amount_in * (1.0 - state.fee);
    let amount_out = net_in * state.reserve_out / (state.reserve_in + net_in);
    Ok(Swap {
        amount_out,
        fee: amount_in * state.fee,
        marginal_rate: (1.0 - state.fee) * state.reserve_out / state.reserve_in,
    })
}

fn price_stable(amount_in: f64, state: &PoolState) -> Result<Swap> {
    let (scale_in, scale_out) = match (state.precision_in, state.precision_out) {
        (Some(p_in), Some(p_out)) if p_in > 0.0 && p_out > 0.0 => (p_in, p_out),
        _ => return Err(QuoterError::invalid_pool(state.pool_type, "precision factors missing")),
    };
    price_on_flat_curve(amount_in, state, scale_in, scale_out)
}

/// Flat curve with the pegged side valued at the peg target.
fn price_pegged(amount_in: f64, state: &PoolState) -> Result<Swap> {
    let peg = state
        .peg
        .filter(|p| p.ratio.is_finite() && p.ratio > 0.0)
        .ok_or_else(|| QuoterError::invalid_pool(state.pool_type, "peg target missing"))?;
    let (scale_in, scale_out) = match peg.side {
        PegSide::Input => (peg.ratio, 1.0),
        PegSide::Output => (1.0, peg.ratio),
    };
    price_on_flat_curve(amount_in, state, scale_in, scale_out)
}

/// Trade on the flat invariant after mapping both sides onto a common basis.
fn price_on_flat_curve(amount_in: f64, state: &PoolState, scale_in: f64, scale_out: f64) -> Result<Swap> {
    let x = state.reserve_in * scale_in;
    let y = state.reserve_out * scale_out;
    let dx = amount_in * scale_in;

    let dy = flat_curve::output(x, y, dx)
        .ok_or_else(|| QuoterError::invalid_pool(state.pool_type, "trade exceeds what the curve can fill"))?;
    let gross_out = dy / scale_out;

    Ok(Swap {
        amount_out: gross_out * (1.0 - state.fee),
        fee: gross_out * state.fee,
        marginal_rate: flat_curve::marginal_rate(x, y) * scale_in / scale_out * (1.0 - state.fee),
    })
}

/// Truncate towards zero at `decimals`; keeps the raw value if it cannot be represented.
fn round_down(value: f64, decimals: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(decimals, RoundingStrategy::ToZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// The invariant `u(x, y) = (x + y)^8 - (x - y)^8` used by the stable pools.
mod flat_curve {
    const MAX_ROUNDS: usize = 64;
    const TOLERANCE: f64 = 1e-15;

    fn util(x: f64, y: f64) -> f64 {
        (x + y).powi(8) - (x - y).powi(8)
    }

    fn du_dy(x: f64, y: f64) -> f64 {
        8.0 * ((x + y).powi(7) + (x - y).powi(7))
    }

    /// Amount of `y` released for `dx` of `x`, keeping `u` constant.
    ///
    /// Inputs are normalized by `x + y` so the eighth powers stay in range. Newton's
    /// method from `dy = 0` approaches the root from below because `u` is convex in `y`.
    pub(super) fn output(x: f64, y: f64, dx: f64) -> Option<f64> {
        let scale = x + y;
        if !(scale.is_finite() && scale > 0.0) {
            return None;
        }
        let (x, y, dx) = (x / scale, y / scale, dx / scale);
        let target = util(x, y);
        let x_after = x + dx;

        let mut dy = 0.0;
        for _ in 0..MAX_ROUNDS {
            let y_after = y - dy;
            let step = (util(x_after, y_after) - target) / du_dy(x_after, y_after);
            if !step.is_finite() {
                return None;
            }
            dy += step;
            if step.abs() <= TOLERANCE * y {
                break;
            }
        }
        if !(dy > 0.0 && dy < y) {
            return None;
        }
        Some(dy * scale)
    }

    /// `-dy/dx` at the current point, i.e. the no-trade exchange rate.
    pub(super) fn marginal_rate(x: f64, y: f64) -> f64 {
        let sum = (x + y).powi(7);
        let diff = (x - y).powi(7);
        (sum - diff) / (sum + diff)
    }

}
