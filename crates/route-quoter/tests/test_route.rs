//! Route selection, quote assembly and end-to-end engine tests.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use route_quoter::data_management::pool_state::{PoolState, SwapData};
use route_quoter::engine::pricing::price_hop;
use route_quoter::engine::quoting::{assemble, quote_path, select_best_route};
use route_quoter::{AppConfig, Path, PriceEngine, QuoteRequest, QuoterError, Slippage};

fn path(tokens: &[&str]) -> Path {
    Path::new(tokens.iter().map(|t| t.to_string()).collect())
}

fn engine(pools: &[(&str, &str, &str, &str)], provider: common::MockProvider, config: AppConfig) -> PriceEngine<common::MockProvider> {
    PriceEngine::new(Arc::new(common::graph(pools)), Arc::new(provider), config)
}

fn diamond_provider() -> common::MockProvider {
    common::MockProvider::new()
        .with_pool("pool-ab", &[("A", 1_000.0), ("B", 1_000.0)], 1_000)
        .with_pool("pool-bd", &[("B", 1_000.0), ("D", 1_000.0)], 1_000)
        .with_pool("pool-ac", &[("A", 1_000.0), ("C", 2_000.0)], 1_000)
        .with_pool("pool-cd", &[("C", 2_000.0), ("D", 1_100.0)], 1_000)
        .with_pool("pool-bc", &[("B", 500.0), ("C", 1_000.0)], 1_000)
}

#[test]
fn test_larger_output_wins() {
    let mut swap_data = SwapData::default();
    swap_data.insert("A", "B", Ok(PoolState::volatile("A", "B", 1_000.0, 990.0, 0.0)));
    swap_data.insert("A", "C", Ok(PoolState::volatile("A", "C", 1_000.0, 1_045.0, 0.0)));

    let paths = vec![path(&["A", "B"]), path(&["A", "C"])];
    let best = select_best_route(&paths, &swap_data, 100.0, Slippage::ONE_PERCENT).unwrap();
    assert_eq!(best.path, path(&["A", "C"]));
    assert!((best.amount_out() - 95.0).abs() < 1e-9);
}

#[test]
fn test_tie_keeps_first_path() {
    let mut swap_data = SwapData::default();
    swap_data.insert("A", "B", Ok(PoolState::volatile("A", "B", 1_000.0, 990.0, 0.0)));
    swap_data.insert("A", "C", Ok(PoolState::volatile("A", "C", 1_000.0, 990.0, 0.0)));

    let paths = vec![path(&["A", "B"]), path(&["A", "C"])];
    let best = select_best_route(&paths, &swap_data, 100.0, Slippage::ONE_PERCENT).unwrap();
    assert_eq!(best.path, path(&["A", "B"]));

    let reversed = vec![path(&["A", "C"]), path(&["A", "B"])];
    let best = select_best_route(&reversed, &swap_data, 100.0, Slippage::ONE_PERCENT).unwrap();
    assert_eq!(best.path, path(&["A", "C"]));
}

#[test]
fn test_two_hop_aggregates_are_sums() {
    let first = PoolState::volatile("A", "B", 1_000.0, 1_000.0, 0.003);
    let second = PoolState::volatile("B", "C", 500.0, 800.0, 0.001);
    let mut swap_data = SwapData::default();
    swap_data.insert("A", "B", Ok(first.clone()));
    swap_data.insert("B", "C", Ok(second.clone()));

    let candidate = quote_path(&path(&["A", "B", "C"]), &swap_data, 50.0, Slippage::ONE_PERCENT).unwrap();
    let quote = assemble(candidate);

    let hop1 = price_hop(50.0, &first, Slippage::ONE_PERCENT).unwrap();
    let hop2 = price_hop(hop1.amount_out, &second, Slippage::ONE_PERCENT).unwrap();
    assert_eq!(quote.final_fee_perc, hop1.fee_perc + hop2.fee_perc);
    assert_eq!(quote.final_price_impact, hop1.price_impact + hop2.price_impact);
    assert_eq!(quote.token_out_amount, hop2.amount_out);
    assert_eq!(quote.minimum_out, vec![hop1.minimum_out, hop2.minimum_out]);
    assert_eq!(quote.final_minimum_out, hop2.minimum_out);
    assert_eq!(quote.exchange_rate, hop2.amount_out / 50.0);
    assert_eq!(quote.is_stable, vec![false, false]);
}

#[test]
fn test_failed_hop_excludes_path() {
    let mut swap_data = SwapData::default();
    swap_data.insert("A", "B", Ok(PoolState::volatile("A", "B", 1_000.0, 0.0, 0.0)));
    let paths = vec![path(&["A", "B"])];
    let err = select_best_route(&paths, &swap_data, 10.0, Slippage::ONE_PERCENT).unwrap_err();
    assert_eq!(err, QuoterError::RouteNotFound { from: "A".into(), to: "B".into() });
}

#[tokio::test]
async fn test_engine_picks_best_multihop_route() {
    let engine = engine(&common::diamond(), diamond_provider(), AppConfig::default());
    let quote = engine.quote(&QuoteRequest::new("A", "D", 10.0)).await.unwrap();

    // A -> C doubles the amount and C -> D keeps most of it.
    assert_eq!(quote.path, path(&["A", "C", "D"]));
    assert_eq!(quote.minimum_out.len(), quote.path.len() - 1);
    assert_eq!(quote.hops.len(), 2);
    assert!(quote.token_out_amount > 10.0);
    assert_eq!(quote.exchange_rate, quote.token_out_amount / 10.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_quotes_share_one_engine() {
    let engine = Arc::new(engine(&common::diamond(), diamond_provider(), AppConfig::default()));
    let tasks: Vec<_> = ["B", "C", "D"]
        .into_iter()
        .map(|to| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.quote(&QuoteRequest::new("A", to, 10.0)).await })
        })
        .collect();

    for (task, to) in tasks.into_iter().zip(["B", "C", "D"]) {
        let quote = task.await.unwrap().unwrap();
        assert_eq!(quote.token_out(), to);
    }
}

#[tokio::test]
async fn test_each_directed_pair_is_fetched_once() {
    let engine = engine(&common::diamond(), diamond_provider(), AppConfig::default());
    let paths = engine.paths("A", "D", true, 4);
    let unique: HashSet<(&str, &str)> = paths.iter().flat_map(|p| p.hops()).collect();
    let total_hops: usize = paths.iter().map(Path::hop_count).sum();
    assert!(unique.len() < total_hops);

    engine.quote(&QuoteRequest::new("A", "D", 10.0)).await.unwrap();
    assert_eq!(engine.provider.fetch_count(), unique.len());
}

#[tokio::test]
async fn test_unusable_pool_is_not_a_zero_quote() {
    let provider = common::MockProvider::new().with_pool("pool-ab", &[("A", 0.0), ("B", 1_000.0)], 1_000);
    let engine = engine(&[("pool-ab", "A", "B", "VOLATILE")], provider, AppConfig::default());
    let err = engine.quote(&QuoteRequest::new("A", "B", 10.0)).await.unwrap_err();
    assert!(matches!(err, QuoterError::RouteNotFound { .. }));
}

#[tokio::test]
async fn test_failed_fetch_only_drops_its_paths() {
    let provider = diamond_provider().failing("pool-bd");
    let engine = engine(&common::diamond(), provider, AppConfig::default());
    let quote = engine.quote(&QuoteRequest::new("A", "D", 10.0)).await.unwrap();
    assert_eq!(quote.path.tokens.last().map(String::as_str), Some("D"));
    assert!(quote.path.hops().all(|hop| hop != ("B", "D")));
}

#[tokio::test]
async fn test_no_path_and_unknown_token() {
    let engine = engine(
        &[("pool-ab", "A", "B", "VOLATILE"), ("pool-cd", "C", "D", "VOLATILE")],
        common::MockProvider::new(),
        AppConfig::default(),
    );
    assert!(matches!(
        engine.quote(&QuoteRequest::new("A", "D", 1.0)).await,
        Err(QuoterError::NoPathFound { .. })
    ));
    assert_eq!(
        engine.quote(&QuoteRequest::new("A", "ZZZ", 1.0)).await.unwrap_err(),
        QuoterError::UnknownToken("ZZZ".into())
    );
    assert_eq!(
        engine.quote(&QuoteRequest::new("A", "B", -1.0)).await.unwrap_err(),
        QuoterError::InvalidAmount(-1.0)
    );
}

#[tokio::test]
async fn test_direct_only_request() {
    let engine = engine(&common::diamond(), diamond_provider(), AppConfig::default());
    let err = engine.quote(&QuoteRequest::new("A", "D", 10.0).direct_only()).await.unwrap_err();
    assert_eq!(err, QuoterError::NoPathFound { from: "A".into(), to: "D".into(), max_hops: 1 });
}

#[tokio::test]
async fn test_zero_max_hops_finds_no_route() {
    let engine = engine(&common::diamond(), diamond_provider(), AppConfig::default());
    assert!(engine.paths("A", "B", true, 0).is_empty());

    let err = engine.quote(&QuoteRequest::new("A", "B", 10.0).with_max_hops(0)).await.unwrap_err();
    assert_eq!(err, QuoterError::NoPathFound { from: "A".into(), to: "B".into(), max_hops: 0 });
    assert_eq!(engine.provider.fetch_count(), 0);
}

#[tokio::test]
async fn test_zero_slippage_uses_default() {
    let config = AppConfig { default_slippage: Slippage::new(0.02).unwrap(), ..AppConfig::default() };
    let provider = common::MockProvider::new().with_pool("pool-ab", &[("A", 1_000.0), ("B", 1_000.0)], 1_000);
    let engine = engine(&[("pool-ab", "A", "B", "VOLATILE")], provider, config);

    let quote = engine
        .quote(&QuoteRequest::new("A", "B", 10.0).with_slippage(Slippage::ZERO))
        .await
        .unwrap();
    assert!((quote.final_minimum_out - quote.token_out_amount * 0.98).abs() < 2e-6);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let config = AppConfig { quote_timeout: Duration::from_millis(20), ..AppConfig::default() };
    let provider = diamond_provider().with_delay(Duration::from_millis(500));
    let engine = engine(&common::diamond(), provider, config);

    let err = engine.quote(&QuoteRequest::new("A", "D", 10.0)).await.unwrap_err();
    assert_eq!(err, QuoterError::Timeout(Duration::from_millis(20)));
}

#[tokio::test]
async fn test_swap_plan_in_raw_units() {
    let provider = common::MockProvider::new().with_pool("pool-ab", &[("A", 1_000.0), ("B", 1_000.0)], 1_000);
    let engine = engine(&[("pool-ab", "A", "B", "VOLATILE")], provider, AppConfig::default());
    let quote = engine.quote(&QuoteRequest::new("A", "B", 1.5)).await.unwrap();

    let plan = quote.swap_plan(&engine.graph).unwrap();
    assert_eq!(plan.path, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(plan.amount_in_raw, 1_500_000);
    assert_eq!(plan.minimum_out_raw.len(), 1);
    assert!(plan.minimum_out_raw[0] > 0);
}
