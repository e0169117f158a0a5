//! File-backed chain state: pool reserves read from a JSON snapshot.

use std::collections::HashMap;
use std::fs;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use route_quoter::{ChainStateProvider, RawPoolState};
use serde::Deserialize;

/// One pool's storage as captured from the chain, in raw units.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    /// Raw reserve per token symbol.
    pub reserves: HashMap<String, u128>,
    pub lp_fee: u128,
    #[serde(default)]
    pub lp_supply: u128,
    #[serde(default)]
    pub peg_target: Option<u128>,
}

/// Serves pool states from a snapshot file keyed by pool address.
#[derive(Debug, Default)]
pub struct SnapshotProvider {
    pools: HashMap<String, PoolSnapshot>,
}

impl SnapshotProvider {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let pools = serde_json::from_str(json).context("invalid pool state snapshot")?;
        Ok(Self { pools })
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| format!("reading pool states from {}", path))?;
        Self::from_json_str(&contents)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }
}

#[async_trait]
impl ChainStateProvider for SnapshotProvider {
    async fn fetch_pool_state(
        &self,
        pool_address: &str,
        token_in: &str,
        token_out: &str,
    ) -> Result<RawPoolState> {
        let pool = self
            .pools
            .get(pool_address)
            .ok_or_else(|| anyhow!("no snapshot for pool {}", pool_address))?;
        let reserve = |symbol: &str| {
            pool.reserves
                .get(symbol)
                .copied()
                .ok_or_else(|| anyhow!("pool {} has no reserve for {}", pool_address, symbol))
        };
        Ok(RawPoolState {
            reserve_in: reserve(token_in)?,
            reserve_out: reserve(token_out)?,
            lp_fee: pool.lp_fee,
            lp_supply: pool.lp_supply,
            peg_target: pool.peg_target,
        })
    }
}
