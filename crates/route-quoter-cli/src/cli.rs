//! Output formatting for quotes.

use route_quoter::{RouteQuote, TokenGraph};
use rust_decimal::prelude::*;
use tracing::warn;

/// Human amount rounded to 6 decimals for display.
pub fn format_amount(amount: f64) -> String {
    Decimal::from_f64(amount)
        .map(|d| d.round_dp(6).normalize().to_string())
        .unwrap_or_else(|| amount.to_string())
}

pub fn format_percent(value: f64) -> String {
    format!("{}%", format_amount(value))
}

/// Print the best route, its per-hop breakdown and the raw-unit swap plan.
pub fn print_quote(quote: &RouteQuote, graph: &TokenGraph) {
    let sell = quote.token_in();
    let buy = quote.token_out();

    println!("\n--- Best Route ---");
    println!("Route: {}", quote.path);
    println!("Selling: {} {}", format_amount(quote.token_in_amount), sell);
    println!("Receiving: {} {}", format_amount(quote.token_out_amount), buy);
    println!("Minimum Received: {} {}", format_amount(quote.final_minimum_out), buy);
    println!("Exchange Rate: {} {} per {}", format_amount(quote.exchange_rate), buy, sell);
    println!("Total Fee: {}", format_percent(quote.final_fee_perc));
    println!("Price Impact: {}", format_percent(quote.final_price_impact));

    println!("\n--- Hops ---");
    for (i, hop) in quote.hops.iter().enumerate() {
        let stable = if quote.is_stable[i] { " (stable)" } else { "" };
        println!("  Hop {}: {} -> {} via {} pool{}", i + 1, hop.token_in, hop.token_out, hop.pool_type, stable);
        println!("    In: {} {}", format_amount(hop.amount_in), hop.token_in);
        println!("    Out: {} {}", format_amount(hop.amount_out), hop.token_out);
        println!("    Minimum Out: {} {}", format_amount(hop.minimum_out), hop.token_out);
        println!("    Fee: {}  Price Impact: {}", format_percent(hop.fee_perc), format_percent(hop.price_impact));
    }

    match quote.swap_plan(graph).map(|plan| serde_json::to_string_pretty(&plan)) {
        Ok(Ok(json)) => println!("\n--- Swap Plan (raw units) ---\n{}", json),
        Ok(Err(e)) => warn!(error = %e, "Could not serialize swap plan"),
        Err(e) => warn!(error = %e, "Could not build swap plan"),
    }
}
