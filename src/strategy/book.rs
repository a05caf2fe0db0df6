//! Order-book walker.
//!
//! Spends a USDC budget against an ask ladder, cheapest level first,
//! and reports how many shares the budget buys and what it costs.

use tracing::trace;

use crate::types::BookLevel;

/// Raw result of walking the ladder (unrounded).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BookFill {
    pub shares: f64,
    pub cost: f64,
}

impl BookFill {
    /// Cost per share, or `None` when nothing filled.
    pub fn avg_price(&self) -> Option<f64> {
        if self.shares > 0.0 {
            Some(self.cost / self.shares)
        } else {
            None
        }
    }
}

/// Walk `asks` with a notional `budget`.
///
/// Levels are sorted ascending by price first since the source order is
/// not trusted. Levels with non-positive price or size are skipped. The
/// last level touched may be consumed partially, after which the walk
/// stops.
pub fn walk_book(asks: &[BookLevel], budget: f64) -> BookFill {
    let mut fill = BookFill::default();
    if budget.is_nan() || budget <= 0.0 {
        return fill;
    }

    let mut ladder: Vec<BookLevel> = asks.iter().copied().filter(BookLevel::is_valid).collect();
    ladder.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut remaining = budget;
    for level in &ladder {
        if remaining <= 0.0 {
            break;
        }

        let level_cost = level.notional();
        if level_cost <= remaining {
            fill.shares += level.size;
            fill.cost += level_cost;
            remaining -= level_cost;
        } else {
            fill.shares += remaining / level.price;
            fill.cost += remaining;
            trace!(price = level.price, partial = remaining, "Budget exhausted mid-level");
            break;
        }
    }

    fill
}

/// Sum of price × size over every ask level, valid or not.
pub fn ask_depth(asks: &[BookLevel]) -> f64 {
    asks.iter().map(BookLevel::notional).sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
