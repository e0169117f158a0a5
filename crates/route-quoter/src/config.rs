//! Configuration loading, env vars, CLI flags.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

#[cfg(feature = "cli")]
use clap::Parser;

use crate::types::{QuoterError, Result, Slippage};
use crate::utils::token_list::load_token_list;

pub const DEFAULT_MAX_HOPS: usize = 4;
pub const DEFAULT_QUOTE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 256;

/// A native/wrapped pair priced against a moving peg target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeggedPair {
    pub base: String,
    pub pegged: String,
}

fn default_deny_list() -> Vec<String> {
    vec!["SEB".to_string(), "PEPE".to_string()]
}

fn default_pegged_pairs() -> Vec<PeggedPair> {
    vec![PeggedPair { base: "XTZ".to_string(), pegged: "CTez".to_string() }]
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub max_hops: usize,
    pub allow_multihop: bool,
    pub default_slippage: Slippage,
    pub deny_list: Vec<String>,
    pub pegged_pairs: Vec<PeggedPair>,
    pub quote_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub path_cache_capacity: usize,
    pub registry_file: Option<String>,
    pub pool_states_file: Option<String>,
    pub sell_token: Option<String>,
    pub buy_token: Option<String>,
    pub sell_amount: Option<f64>,
    pub slippage: Option<Slippage>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            allow_multihop: true,
            default_slippage: Slippage::ONE_PERCENT,
            deny_list: default_deny_list(),
            pegged_pairs: default_pegged_pairs(),
            quote_timeout: Duration::from_millis(DEFAULT_QUOTE_TIMEOUT_MS),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            path_cache_capacity: DEFAULT_PATH_CACHE_CAPACITY,
            registry_file: None,
            pool_states_file: None,
            sell_token: None,
            buy_token: None,
            sell_amount: None,
            slippage: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub max_hops: Option<usize>,
    pub allow_multihop: Option<bool>,
    pub default_slippage: Option<String>,
    pub deny_list: Option<Vec<String>>,
    pub deny_list_file: Option<String>,
    pub pegged_pairs: Option<Vec<PeggedPair>>,
    pub quote_timeout_ms: Option<u64>,
    pub max_concurrent_fetches: Option<usize>,
    pub path_cache_capacity: Option<usize>,
    pub registry_file: Option<String>,
    pub pool_states_file: Option<String>,
    pub sell_token: Option<String>,
    pub buy_token: Option<String>,
    pub sell_amount: Option<f64>,
    pub slippage: Option<String>,
}

impl FileConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| QuoterError::Config(e.to_string()))
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| QuoterError::Config(format!("unable to read {}: {}", path, e)))?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(feature = "cli")]
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliConfig {
    #[arg(long)]
    pub config: Option<String>,
    #[arg(long)]
    pub max_hops: Option<usize>,
    /// Only consider direct (single-pool) swaps.
    #[arg(long)]
    pub direct_only: bool,
    #[arg(long)]
    pub default_slippage: Option<String>,
    /// Comma-separated token symbols to exclude.
    #[arg(long)]
    pub deny_list: Option<String>,
    #[arg(long)]
    pub deny_list_file: Option<String>,
    #[arg(long)]
    pub quote_timeout_ms: Option<u64>,
    #[arg(long)]
    pub max_concurrent_fetches: Option<usize>,
    #[arg(long)]
    pub registry_file: Option<String>,
    #[arg(long)]
    pub pool_states_file: Option<String>,
    #[arg(long)]
    pub sell_token: Option<String>,
    #[arg(long)]
    pub buy_token: Option<String>,
    #[arg(long)]
    pub sell_amount: Option<f64>,
    /// Slippage tolerance, e.g. `1/100` or `0.005`; `0` uses the default.
    #[arg(long)]
    pub slippage: Option<String>,
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| QuoterError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn parse_slippage(raw: Option<String>) -> Result<Option<Slippage>> {
    raw.map(|s| s.parse::<Slippage>()).transpose()
}

impl AppConfig {
    /// Defaults overridden by environment variables.
    pub fn load() -> Result<Self> {
        Self::layered(FileConfig::default(), LayerOverrides::default())
    }

    /// Defaults, then env vars, then the TOML file, then explicit overrides.
    fn layered(file: FileConfig, cli: LayerOverrides) -> Result<Self> {
        let mut cfg = AppConfig::default();

        let max_hops = cli.max_hops.or(file.max_hops).or(env_parse("MAX_HOPS")?);
        if let Some(max_hops) = max_hops {
            if max_hops == 0 {
                return Err(QuoterError::Config("max_hops must be at least 1".into()));
            }
            cfg.max_hops = max_hops;
        }

        if cli.direct_only {
            cfg.allow_multihop = false;
        } else if let Some(multihop) = file.allow_multihop.or(env_parse("ALLOW_MULTIHOP")?) {
            cfg.allow_multihop = multihop;
        }

        let default_slippage = cli
            .default_slippage
            .or(file.default_slippage)
            .or(env::var("DEFAULT_SLIPPAGE").ok());
        if let Some(s) = parse_slippage(default_slippage)? {
            if s == Slippage::ZERO {
                return Err(QuoterError::Config("default_slippage must be non-zero".into()));
            }
            cfg.default_slippage = s;
        }

        if let Some(list) = cli
            .deny_list
            .map(|s| split_list(&s))
            .or(file.deny_list)
            .or(env::var("DENY_LIST").ok().map(|s| split_list(&s)))
        {
            cfg.deny_list = list;
        }
        let deny_list_file = cli
            .deny_list_file
            .or(file.deny_list_file)
            .or(env::var("DENY_LIST_FILE").ok());
        if let Some(path) = deny_list_file {
            let extra = load_token_list(&path).map_err(|e| QuoterError::Config(e.to_string()))?;
            for symbol in extra {
                if !cfg.deny_list.contains(&symbol) {
                    cfg.deny_list.push(symbol);
                }
            }
        }

        if let Some(pairs) = file.pegged_pairs {
            cfg.pegged_pairs = pairs;
        }

        if let Some(ms) = cli
            .quote_timeout_ms
            .or(file.quote_timeout_ms)
            .or(env_parse("QUOTE_TIMEOUT_MS")?)
        {
            cfg.quote_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = cli
            .max_concurrent_fetches
            .or(file.max_concurrent_fetches)
            .or(env_parse("MAX_CONCURRENT_FETCHES")?)
        {
            cfg.max_concurrent_fetches = n.max(1);
        }
        if let Some(n) = file.path_cache_capacity.or(env_parse("PATH_CACHE_CAPACITY")?) {
            cfg.path_cache_capacity = n;
        }

        cfg.registry_file = cli
            .registry_file
            .or(file.registry_file)
            .or(env::var("REGISTRY_FILE").ok());
        cfg.pool_states_file = cli
            .pool_states_file
            .or(file.pool_states_file)
            .or(env::var("POOL_STATES_FILE").ok());
        if cfg.registry_file.is_none() {
            info!("REGISTRY_FILE not set; a registry must be supplied programmatically.");
        }

        cfg.sell_token = cli.sell_token.or(file.sell_token).or(env::var("SELL_TOKEN").ok());
        cfg.buy_token = cli.buy_token.or(file.buy_token).or(env::var("BUY_TOKEN").ok());
        cfg.sell_amount = match cli.sell_amount.or(file.sell_amount) {
            Some(amount) => Some(amount),
            None => env_parse("SELL_AMOUNT")?,
        };
        cfg.slippage = parse_slippage(cli.slippage.or(file.slippage))?;

        Ok(cfg)
    }

    /// Layer a TOML file over env vars and defaults.
    pub fn load_from_file(path: &str) -> Result<Self> {
        Self::layered(FileConfig::from_file(path)?, LayerOverrides::default())
    }

    #[cfg(feature = "cli")]
    pub fn load_with_cli() -> Result<Self> {
        Self::from_cli(CliConfig::parse())
    }

    #[cfg(feature = "cli")]
    pub fn from_cli(cli: CliConfig) -> Result<Self> {
        let file = match cli.config.as_deref() {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        let overrides = LayerOverrides {
            max_hops: cli.max_hops,
            direct_only: cli.direct_only,
            default_slippage: cli.default_slippage,
            deny_list: cli.deny_list,
            deny_list_file: cli.deny_list_file,
            quote_timeout_ms: cli.quote_timeout_ms,
            max_concurrent_fetches: cli.max_concurrent_fetches,
            registry_file: cli.registry_file,
            pool_states_file: cli.pool_states_file,
            sell_token: cli.sell_token,
            buy_token: cli.buy_token,
            sell_amount: cli.sell_amount,
            slippage: cli.slippage,
        };
        Self::layered(file, overrides)
    }
}

/// Highest-precedence values (command-line flags when the `cli` feature is on).
#[derive(Debug, Default)]
struct LayerOverrides {
    max_hops: Option<usize>,
    direct_only: bool,
    default_slippage: Option<String>,
    deny_list: Option<String>,
    deny_list_file: Option<String>,
    quote_timeout_ms: Option<u64>,
    max_concurrent_fetches: Option<usize>,
    registry_file: Option<String>,
    pool_states_file: Option<String>,
    sell_token: Option<String>,
    buy_token: Option<String>,
    sell_amount: Option<f64>,
    slippage: Option<String>,
}
