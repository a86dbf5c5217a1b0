use std::collections::{HashMap, VecDeque};

use anyhow::Result;

use super::Strategy;
use crate::exchange::islay::Order;
use crate::input::TickDepth;

/// Takes liquidity that is priced through a fair value.
///
/// Fair value is either fixed per product or, if none is set, the mean of the last `window` mid
/// prices. Buys up to `clip` when the best ask is at least `edge` below fair value and sells up to
/// `clip` when the best bid is at least `edge` above it. The limit price is the fair value less
/// (or plus) the edge so every level priced through it is taken.
#[derive(Clone, Debug)]
pub struct FairValueStrategy {
    fixed: HashMap<String, f64>,
    mids: HashMap<String, VecDeque<f64>>,
    window: usize,
    edge: f64,
    clip: u64,
}

impl FairValueStrategy {
    fn fair_value(&self, product: &str) -> Option<f64> {
        if let Some(value) = self.fixed.get(product) {
            return Some(*value);
        }

        let mids = self.mids.get(product)?;
        if mids.len() < self.window {
            return None;
        }
        Some(mids.iter().sum::<f64>() / mids.len() as f64)
    }

    fn record_mid(&mut self, product: &str, mid: f64) {
        let mids = self.mids.entry(product.to_string()).or_default();
        mids.push_back(mid);
        while mids.len() > self.window {
            mids.pop_front();
        }
    }

    pub fn with_fair_value(mut self, product: impl Into<String>, value: f64) -> Self {
        self.fixed.insert(product.into(), value);
        self
    }

    pub fn new(window: usize, edge: f64, clip: u64) -> Self {
        Self {
            fixed: HashMap::new(),
            mids: HashMap::new(),
            window: window.max(1),
            edge,
            clip,
        }
    }
}

impl Default for FairValueStrategy {
    fn default() -> Self {
        Self::new(20, 1.0, 10)
    }
}

impl Strategy for FairValueStrategy {
    fn run(&mut self, depth: &TickDepth, products: &[String]) -> Result<Vec<Order>> {
        let mut orders = Vec::new();

        for product in products {
            let Some(book) = depth.get(product) else {
                continue;
            };
            let (Some(bid), Some(ask)) = (book.get_best_bid(), book.get_best_ask()) else {
                continue;
            };

            self.record_mid(product, (bid.price + ask.price) / 2.0);
            let Some(fair) = self.fair_value(product) else {
                continue;
            };

            if ask.price <= fair - self.edge {
                orders.push(Order::buy(product.clone(), self.clip, fair - self.edge));
            }
            if bid.price >= fair + self.edge {
                orders.push(Order::sell(product.clone(), self.clip, fair + self.edge));
            }
        }
        Ok(orders)
    }
}
