//! Pool registry snapshot: tokens, pools, deny-list filtering.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PeggedPair;
use crate::types::{QuoterError, Result};

/// A token as listed in the registry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub symbol: String,
    pub decimals: u32,
    pub address: String,
    #[serde(default)]
    pub token_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Liquidity-token metadata of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpToken {
    pub symbol: String,
    pub decimals: u32,
    pub address: String,
}

/// Pricing family of a pool, fixed when the registry is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolType {
    /// Constant-product pool.
    Volatile,
    /// Flat-curve pool between near-pegged assets, priced on a common precision basis.
    GeneralizedStable,
    /// Flat-curve pool anchored to a moving peg target (native/wrapped pair).
    PeggedHybrid,
}

impl PoolType {
    pub fn is_stable(&self) -> bool {
        matches!(self, PoolType::GeneralizedStable)
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolType::Volatile => "volatile",
            PoolType::GeneralizedStable => "stable",
            PoolType::PeggedHybrid => "pegged-hybrid",
        };
        f.write_str(s)
    }
}

/// Order-independent pool identity: the two symbols sorted lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey(String, String);

impl PoolKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            PoolKey(a.to_string(), b.to_string())
        } else {
            PoolKey(b.to_string(), a.to_string())
        }
    }

    pub fn tokens(&self) -> (&str, &str) {
        (&self.0, &self.1)
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// A liquidity pool between two registry tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub key: PoolKey,
    pub address: String,
    pub pool_type: PoolType,
    /// Symbols in registry order.
    pub token1: String,
    pub token2: String,
    pub fee: Option<f64>,
    pub lp_token: LpToken,
    /// Raw-unit precision multipliers `(token1, token2)`; stable pools only.
    pub precision: Option<(Decimal, Decimal)>,
    /// Symbol of the token valued through the peg target; pegged-hybrid pools only.
    pub pegged_token: Option<String>,
}

impl Pool {
    pub fn contains(&self, symbol: &str) -> bool {
        self.token1 == symbol || self.token2 == symbol
    }

    /// Precision multiplier of `symbol`, if this pool carries one.
    pub fn precision_of(&self, symbol: &str) -> Option<Decimal> {
        let (p1, p2) = self.precision?;
        if symbol == self.token1 {
            Some(p1)
        } else if symbol == self.token2 {
            Some(p2)
        } else {
            None
        }
    }
}

/// Pool type tag as published by the registry feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedPoolType {
    Volatile,
    Tez,
    Stable,
    Pegged,
}

/// One entry of the registry feed (keyed by pool address in the feed object).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub address: String,
    pub token1: Token,
    pub token2: Token,
    #[serde(rename = "type")]
    pub pool_type: FeedPoolType,
    #[serde(default)]
    pub fees: Option<f64>,
    pub lp_token: LpToken,
    #[serde(default)]
    pub token1_precision: Option<Decimal>,
    #[serde(default)]
    pub token2_precision: Option<Decimal>,
    #[serde(default)]
    pub pegged_token: Option<String>,
}

/// Immutable snapshot of tokens and pools, filtered by the deny-list.
#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    pub tokens: IndexMap<String, Token>,
    pub pools: IndexMap<PoolKey, Pool>,
}

impl PoolRegistry {
    /// Parse a registry feed: a JSON object mapping pool address to entry.
    pub fn from_json_str(json: &str, deny_list: &[String], pegged_pairs: &[PeggedPair]) -> Result<Self> {
        let feed: IndexMap<String, RegistryEntry> =
            serde_json::from_str(json).map_err(|e| QuoterError::Registry(e.to_string()))?;
        Self::from_entries(feed.into_values(), deny_list, pegged_pairs)
    }

    /// Build the registry from feed entries. Later entries for an already-seen pair
    /// replace the earlier pool; the first sighting of a token wins.
    pub fn from_entries(
        entries: impl IntoIterator<Item = RegistryEntry>,
        deny_list: &[String],
        pegged_pairs: &[PeggedPair],
    ) -> Result<Self> {
        let denied: HashSet<&str> = deny_list.iter().map(String::as_str).collect();
        let mut registry = PoolRegistry::default();

        for entry in entries {
            let (s1, s2) = (entry.token1.symbol.as_str(), entry.token2.symbol.as_str());
            if denied.contains(s1) || denied.contains(s2) {
                debug!(pool = %entry.address, token1 = s1, token2 = s2, "Skipping pool with deny-listed token");
                continue;
            }
            if s1 == s2 {
                warn!(pool = %entry.address, token = s1, "Skipping pool pairing a token with itself");
                continue;
            }
            let pool = match Self::pool_from_entry(&entry, pegged_pairs) {
                Ok(pool) => pool,
                Err(e) => {
                    warn!(pool = %entry.address, error = %e, "Skipping malformed pool entry");
                    continue;
                }
            };
            for token in [&entry.token1, &entry.token2] {
                if !registry.tokens.contains_key(&token.symbol) {
                    registry.tokens.insert(token.symbol.clone(), token.clone());
                }
            }
            registry.pools.insert(pool.key.clone(), pool);
        }
        Ok(registry)
    }

    fn pool_from_entry(entry: &RegistryEntry, pegged_pairs: &[PeggedPair]) -> Result<Pool> {
        let key = PoolKey::new(&entry.token1.symbol, &entry.token2.symbol);
        let pegged_pair = pegged_pairs.iter().find(|p| PoolKey::new(&p.base, &p.pegged) == key);

        let pool_type = match entry.pool_type {
            FeedPoolType::Volatile | FeedPoolType::Tez => PoolType::Volatile,
            FeedPoolType::Stable if pegged_pair.is_some() => PoolType::PeggedHybrid,
            FeedPoolType::Stable => PoolType::GeneralizedStable,
            FeedPoolType::Pegged => PoolType::PeggedHybrid,
        };

        let pegged_token = match pool_type {
            PoolType::PeggedHybrid => {
                let symbol = entry
                    .pegged_token
                    .clone()
                    .or_else(|| pegged_pair.map(|p| p.pegged.clone()))
                    // registry convention: the pegged asset is listed second
                    .unwrap_or_else(|| entry.token2.symbol.clone());
                if symbol != entry.token1.symbol && symbol != entry.token2.symbol {
                    return Err(QuoterError::Registry(format!(
                        "pool {}: pegged token {} is not part of the pair",
                        entry.address, symbol
                    )));
                }
                Some(symbol)
            }
            _ => None,
        };

        let precision = match (entry.token1_precision, entry.token2_precision) {
            (Some(p1), Some(p2)) => Some((p1, p2)),
            _ => None,
        };

        Ok(Pool {
            key,
            address: entry.address.clone(),
            pool_type,
            token1: entry.token1.symbol.clone(),
            token2: entry.token2.symbol.clone(),
            fee: entry.fees,
            lp_token: entry.lp_token.clone(),
            precision,
            pegged_token,
        })
    }

    pub fn token(&self, symbol: &str) -> Option<&Token> {
        self.tokens.get(symbol)
    }

    /// Order-independent pool lookup.
    pub fn pool(&self, a: &str, b: &str) -> Option<&Pool> {
        self.pools.get(&PoolKey::new(a, b))
    }
}
