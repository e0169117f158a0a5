//! Common types, error handling, request models.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::PoolType;

/// Common error type for the route-quoter core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoterError {
    #[error("no path from {from} to {to} within {max_hops} hops")]
    NoPathFound { from: String, to: String, max_hops: usize },

    #[error("pool state unavailable for {token_in} -> {token_out}: {reason}")]
    PoolStateUnavailable { token_in: String, token_out: String, reason: String },

    #[error("invalid {pool_type} pool parameters: {reason}")]
    InvalidPoolParameters { pool_type: PoolType, reason: String },

    #[error("no viable route from {from} to {to}")]
    RouteNotFound { from: String, to: String },

    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("invalid input amount: {0}")]
    InvalidAmount(f64),

    #[error("invalid slippage tolerance: {0}")]
    InvalidSlippage(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("quote timed out after {0:?}")]
    Timeout(Duration),

    #[error("route selection aborted: {0}")]
    Selection(String),
}

impl QuoterError {
    pub(crate) fn invalid_pool(pool_type: PoolType, reason: impl Into<String>) -> Self {
        QuoterError::InvalidPoolParameters { pool_type, reason: reason.into() }
    }

    pub(crate) fn unavailable(token_in: &str, token_out: &str, reason: impl fmt::Display) -> Self {
        QuoterError::PoolStateUnavailable {
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QuoterError>;

/// Slippage tolerance as a fraction in `[0, 1)`.
///
/// Parses either a fraction string (`"1/100"`) or a decimal (`"0.01"`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slippage(f64);

impl Slippage {
    pub const ZERO: Slippage = Slippage(0.0);
    pub const ONE_PERCENT: Slippage = Slippage(0.01);

    pub fn new(fraction: f64) -> Result<Self> {
        if !fraction.is_finite() || !(0.0..1.0).contains(&fraction) {
            return Err(QuoterError::InvalidSlippage(fraction.to_string()));
        }
        Ok(Slippage(fraction))
    }

    pub fn fraction(&self) -> f64 {
        self.0
    }

    /// A zero tolerance means "use the default", never "no tolerance".
    pub fn or_default(self, default: Slippage) -> Slippage {
        if self.0 == 0.0 {
            default
        } else {
            self
        }
    }

    /// Lowest acceptable output for `amount_out` under this tolerance.
    pub fn apply(&self, amount_out: f64) -> f64 {
        amount_out * (1.0 - self.0)
    }
}

impl FromStr for Slippage {
    type Err = QuoterError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || QuoterError::InvalidSlippage(s.to_string());
        let value = match s.trim().split_once('/') {
            Some((num, den)) => {
                let num = Decimal::from_str(num.trim()).map_err(|_| invalid())?;
                let den = Decimal::from_str(den.trim()).map_err(|_| invalid())?;
                num.checked_div(den).ok_or_else(invalid)?
            }
            None => Decimal::from_str(s.trim()).map_err(|_| invalid())?,
        };
        Slippage::new(value.to_f64().ok_or_else(invalid)?)
    }
}

impl TryFrom<String> for Slippage {
    type Error = QuoterError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Slippage> for String {
    fn from(s: Slippage) -> String {
        s.0.to_string()
    }
}

impl fmt::Display for Slippage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0 * 100.0)
    }
}

/// A quote request in human units of the input token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: f64,
    #[serde(default)]
    pub slippage: Option<Slippage>,
    #[serde(default)]
    pub allow_multihop: Option<bool>,
    #[serde(default)]
    pub max_hops: Option<usize>,
}

impl QuoteRequest {
    pub fn new(token_in: impl Into<String>, token_out: impl Into<String>, amount_in: f64) -> Self {
        Self {
            token_in: token_in.into(),
            token_out: token_out.into(),
            amount_in,
            slippage: None,
            allow_multihop: None,
            max_hops: None,
        }
    }

    pub fn with_slippage(mut self, slippage: Slippage) -> Self {
        self.slippage = Some(slippage);
        self
    }

    pub fn direct_only(mut self) -> Self {
        self.allow_multihop = Some(false);
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = Some(max_hops);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fraction() {
        let s: Slippage = "1/100".parse().unwrap();
        assert!((s.fraction() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_parse_decimal() {
        let s: Slippage = "0.005".parse().unwrap();
        assert!((s.fraction() - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!("1/1".parse::<Slippage>().is_err());
        assert!("-1/100".parse::<Slippage>().is_err());
        assert!("1/0".parse::<Slippage>().is_err());
        assert!("abc".parse::<Slippage>().is_err());
        assert!(Slippage::new(f64::NAN).is_err());
    }

    #[test]
    fn test_zero_means_default() {
        let default = Slippage::new(0.01).unwrap();
        assert_eq!(Slippage::ZERO.or_default(default), default);
        let custom = Slippage::new(0.03).unwrap();
        assert_eq!(custom.or_default(default), custom);
    }

    #[test]
    fn test_apply() {
        let s = Slippage::new(0.01).unwrap();
        assert!((s.apply(200.0) - 198.0).abs() < 1e-9);
    }
}
