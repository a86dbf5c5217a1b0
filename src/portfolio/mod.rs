//! Cash and inventory of a simulated portfolio.
use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::config::RunConfig;
use crate::exchange::islay::{Fill, OrderSide};
use crate::input::TickDepth;

/// Mark price of every product in the depth.
///
/// The mark is the best ask, falling back to the best bid when the ask side is empty. Products
/// with neither side have no mark. Levels that have been consumed on this tick still count, the
/// mark is the quoted price and not the remaining liquidity.
pub fn marks(depth: &TickDepth) -> HashMap<String, f64> {
    depth
        .iter()
        .filter_map(|(product, book)| {
            book.get_best_ask()
                .or_else(|| book.get_best_bid())
                .map(|level| (product.clone(), level.price))
        })
        .collect()
}

/// Holds cash, signed positions, and position limits for a single run.
///
/// Read access is public. Cash and positions can only be changed through a [Fill] applied by the
/// matching engine so the ledger is always the sum of the fills that produced it.
///
/// Invariant: `|position| <= limit` for every product after every fill.
#[derive(Clone, Debug)]
pub struct Ledger {
    cash: f64,
    positions: BTreeMap<String, i64>,
    limits: BTreeMap<String, u64>,
}

impl Ledger {
    pub fn get_cash(&self) -> f64 {
        self.cash
    }

    pub fn get_position(&self, product: &str) -> i64 {
        self.positions.get(product).copied().unwrap_or(0)
    }

    pub fn get_positions(&self) -> &BTreeMap<String, i64> {
        &self.positions
    }

    pub fn get_limit(&self, product: &str) -> Option<u64> {
        self.limits.get(product).copied()
    }

    /// Products tracked by this ledger, in sorted order.
    pub fn products(&self) -> Vec<String> {
        self.limits.keys().cloned().collect()
    }

    /// Quantity that can be added on `side` before the position limit is breached. Buying can
    /// cover a short position all the way to the long limit, so headroom can exceed the limit
    /// itself. Returns `None` if the product has no limit configured.
    ///
    /// Limits above `i64::MAX` are treated as `i64::MAX` and the result saturates, so a limit of
    /// `u64::MAX` behaves as unlimited.
    pub fn headroom(&self, product: &str, side: OrderSide) -> Option<i64> {
        let limit = i64::try_from(self.get_limit(product)?).unwrap_or(i64::MAX);
        let position = self.get_position(product);
        Some(match side {
            OrderSide::Buy => limit.saturating_sub(position),
            OrderSide::Sell => limit.saturating_add(position),
        })
    }

    pub(crate) fn apply_fill(&mut self, fill: &Fill) {
        let value = fill.quantity as f64 * fill.price;
        let position = self.positions.entry(fill.product.clone()).or_insert(0);
        match fill.side {
            OrderSide::Buy => {
                *position += fill.quantity as i64;
                self.cash -= value;
            }
            OrderSide::Sell => {
                *position -= fill.quantity as i64;
                self.cash += value;
            }
        }

        debug_assert!(
            self.limits
                .get(&fill.product)
                .is_some_and(|limit| position.unsigned_abs() <= *limit),
            "position limit breached for {}",
            fill.product
        );

        debug!(
            "LEDGER: {:?} {} {} @ {}, position {}, cash {}",
            fill.side, fill.quantity, fill.product, fill.price, position, self.cash
        );
    }

    /// Cash plus the value of every position at the supplied marks. A position in a product with
    /// no mark contributes nothing.
    pub fn pnl_with_marks(&self, marks: &HashMap<String, f64>) -> f64 {
        self.positions
            .iter()
            .fold(self.cash, |acc, (product, position)| {
                match marks.get(product) {
                    Some(mark) => acc + *position as f64 * mark,
                    None => acc,
                }
            })
    }

    /// Mark-to-market value against the depth of the current tick. Pure, can be called any
    /// number of times.
    pub fn pnl(&self, depth: &TickDepth) -> f64 {
        self.pnl_with_marks(&marks(depth))
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.initial_cash, config.position_limits.clone())
    }

    pub fn new(initial_cash: f64, limits: BTreeMap<String, u64>) -> Self {
        let positions = limits.keys().map(|product| (product.clone(), 0)).collect();
        Self {
            cash: initial_cash,
            positions,
            limits,
        }
    }
}
