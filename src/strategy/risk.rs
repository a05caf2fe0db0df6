//! Execution-risk checks.
//!
//! Turns a book snapshot and a notional into a `FillEstimate`, applies the
//! slippage warn/block policy, and gates windows that close too soon.

use tracing::debug;

use super::book::{ask_depth, walk_book};
use crate::types::{BookLevel, FillEstimate, FillWarning, MarketWindow, OrderBookSnapshot, TraderError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// A fill costing less than this fraction of the requested notional is
/// flagged as insufficient liquidity.
pub const INSUFFICIENT_FILL_RATIO: f64 = 0.99;

/// Slippage thresholds, in percent of the best ask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlippagePolicy {
    pub warn_pct: f64,
    pub block_pct: f64,
}

impl Default for SlippagePolicy {
    fn default() -> Self {
        Self {
            warn_pct: 3.0,
            block_pct: 5.0,
        }
    }
}

/// Outcome of applying the policy to a slippage figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlippageVerdict {
    Ok,
    Warn,
    Block,
}

impl SlippagePolicy {
    /// Strictly-greater comparisons: slippage equal to a threshold does not trip it.
    pub fn verdict(&self, slippage_pct: f64) -> SlippageVerdict {
        if slippage_pct > self.block_pct {
            SlippageVerdict::Block
        } else if slippage_pct > self.warn_pct {
            SlippageVerdict::Warn
        } else {
            SlippageVerdict::Ok
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

pub(crate) fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

/// Lowest valid ask price.
pub fn best_ask(asks: &[BookLevel]) -> Option<f64> {
    asks.iter()
        .filter(|l| l.is_valid())
        .map(|l| l.price)
        .min_by(f64::total_cmp)
}

/// Highest valid bid price. The source order of bids is not trusted either.
pub fn best_bid(bids: &[BookLevel]) -> Option<f64> {
    bids.iter()
        .filter(|l| l.is_valid())
        .map(|l| l.price)
        .max_by(f64::total_cmp)
}

/// Price a notional against the book and apply the slippage policy.
pub fn evaluate(book: &OrderBookSnapshot, budget: f64, policy: &SlippagePolicy) -> FillEstimate {
    let best_ask = best_ask(&book.asks);
    let best_bid = best_bid(&book.bids);
    let depth = ask_depth(&book.asks);

    let fill = walk_book(&book.asks, budget);
    let avg_price = fill.avg_price();

    let slippage_pct = match (avg_price, best_ask) {
        (Some(avg), Some(best)) => round_dp((avg - best) / best * 100.0, 2),
        _ => 0.0,
    };

    let mut warnings = Vec::new();
    let verdict = policy.verdict(slippage_pct);
    match verdict {
        SlippageVerdict::Block => warnings.push(FillWarning::SlippageBlocked {
            slippage_pct,
            limit_pct: policy.block_pct,
        }),
        SlippageVerdict::Warn => warnings.push(FillWarning::HighSlippage { slippage_pct }),
        SlippageVerdict::Ok => {}
    }

    if fill.cost < budget * INSUFFICIENT_FILL_RATIO {
        warnings.push(FillWarning::InsufficientLiquidity {
            max_fillable: round_dp(fill.cost, 2),
        });
    }

    debug!(
        budget,
        shares = fill.shares,
        cost = fill.cost,
        best_ask = ?best_ask,
        slippage_pct,
        verdict = ?verdict,
        "Book evaluated"
    );

    FillEstimate {
        best_ask,
        best_bid,
        ask_depth: round_dp(depth, 2),
        shares: round_dp(fill.shares, 4),
        cost: round_dp(fill.cost, 4),
        avg_price: avg_price.map(|p| round_dp(p, 4)),
        slippage_pct,
        warnings,
        blocked: verdict == SlippageVerdict::Block,
    }
}

// ---------------------------------------------------------------------------
// Window gate
// ---------------------------------------------------------------------------

/// Refuse windows closing in under `min_time_remaining` seconds.
///
/// Not overridable: `--force` only lifts the slippage block.
pub fn check_window(window: &MarketWindow, min_time_remaining: i64) -> Result<(), TraderError> {
    if window.seconds_remaining < min_time_remaining {
        return Err(TraderError::WindowTooShort {
            remaining: window.seconds_remaining,
            minimum: min_time_remaining,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
