//! Library entry point for route-quoter.
//!
//! Quotes the best multi-hop route between two tokens across a registry of AMM pools and
//! derives the slippage-protected minimum outputs a caller needs to execute it.

pub mod config;
pub mod data_management;
pub mod engine;
pub mod registry;
pub mod types;
pub mod utils;

pub use config::AppConfig;
pub use data_management::pool_state::{ChainStateProvider, PoolState, RawPoolState};
pub use engine::graph::TokenGraph;
pub use engine::pathfinder::{Path, Pathfinder};
pub use engine::quoting::{RouteQuote, SwapPlan};
pub use engine::PriceEngine;
pub use registry::{PoolRegistry, PoolType};
pub use types::{QuoteRequest, QuoterError, Result, Slippage};
