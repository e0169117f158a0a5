//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use route_quoter::config::PeggedPair;
use route_quoter::{ChainStateProvider, PoolRegistry, RawPoolState, TokenGraph};
use serde_json::{json, Value};

pub const DECIMALS: u32 = 6;

/// Human amount to raw units at the fixture decimals.
pub fn raw(amount: f64) -> u128 {
    (amount * 10f64.powi(DECIMALS as i32)).round() as u128
}

fn token(symbol: &str) -> Value {
    json!({ "symbol": symbol, "decimals": DECIMALS, "address": format!("KT1{}", symbol) })
}

/// One registry feed entry: `(pool address, token1, token2, feed type)`.
pub fn entry(address: &str, token1: &str, token2: &str, kind: &str) -> (String, Value) {
    let mut value = json!({
        "address": address,
        "token1": token(token1),
        "token2": token(token2),
        "type": kind,
        "fees": 0.35,
        "lpToken": { "symbol": format!("{}-{}-LP", token1, token2), "decimals": DECIMALS, "address": format!("KT1LP{}", address) },
    });
    if kind == "STABLE" {
        value["token1Precision"] = json!("1");
        value["token2Precision"] = json!("1");
    }
    (address.to_string(), value)
}

pub fn registry_json(entries: &[(String, Value)]) -> String {
    let feed: serde_json::Map<String, Value> = entries.iter().cloned().collect();
    Value::Object(feed).to_string()
}

/// Registry from `(address, token1, token2, type)` tuples with `SEB` deny-listed.
pub fn registry(pools: &[(&str, &str, &str, &str)]) -> PoolRegistry {
    let entries: Vec<_> = pools.iter().map(|(a, t1, t2, k)| entry(a, t1, t2, k)).collect();
    let pegged = vec![PeggedPair { base: "XTZ".into(), pegged: "CTez".into() }];
    PoolRegistry::from_json_str(&registry_json(&entries), &["SEB".to_string()], &pegged).unwrap()
}

pub fn graph(pools: &[(&str, &str, &str, &str)]) -> TokenGraph {
    TokenGraph::new(registry(pools))
}

/// Diamond: A-B, B-D, A-C, C-D and a B-C cross pool.
pub fn diamond() -> Vec<(&'static str, &'static str, &'static str, &'static str)> {
    vec![
        ("pool-ab", "A", "B", "VOLATILE"),
        ("pool-bd", "B", "D", "VOLATILE"),
        ("pool-ac", "A", "C", "VOLATILE"),
        ("pool-cd", "C", "D", "VOLATILE"),
        ("pool-bc", "B", "C", "VOLATILE"),
    ]
}

#[derive(Debug, Clone)]
struct MockPool {
    reserves: HashMap<String, u128>,
    lp_fee: u128,
    peg_target: Option<u128>,
}

/// In-memory chain state with a fetch counter.
#[derive(Debug, Default)]
pub struct MockProvider {
    pools: HashMap<String, MockPool>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pool holding `reserves` (human units) with fee `1 / lp_fee`.
    pub fn with_pool(mut self, address: &str, reserves: &[(&str, f64)], lp_fee: u128) -> Self {
        let reserves = reserves.iter().map(|(s, r)| (s.to_string(), raw(*r))).collect();
        self.pools.insert(address.to_string(), MockPool { reserves, lp_fee, peg_target: None });
        self
    }

    pub fn with_peg_target(mut self, address: &str, target: u128) -> Self {
        if let Some(pool) = self.pools.get_mut(address) {
            pool.peg_target = Some(target);
        }
        self
    }

    pub fn failing(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainStateProvider for MockProvider {
    async fn fetch_pool_state(
        &self,
        pool_address: &str,
        token_in: &str,
        token_out: &str,
    ) -> anyhow::Result<RawPoolState> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(pool_address) {
            anyhow::bail!("node unreachable");
        }
        let pool = self
            .pools
            .get(pool_address)
            .ok_or_else(|| anyhow::anyhow!("unknown pool {}", pool_address))?;
        let reserve = |symbol: &str| pool.reserves.get(symbol).copied().unwrap_or(0);
        Ok(RawPoolState {
            reserve_in: reserve(token_in),
            reserve_out: reserve(token_out),
            lp_fee: pool.lp_fee,
            lp_supply: raw(1_000.0),
            peg_target: pool.peg_target,
        })
    }
}
