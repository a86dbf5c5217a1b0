//! Inputs wrap around a dataset and produce a [TickDepth] for every tick that the rest of the
//! library is built around.
//!
//! Depth handed out by an input is always in priority order: asks ascending by price and bids
//! descending by price, so the best level of either side is the first one. Inputs sort explicitly
//! and never rely on the order in which levels were recorded.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::FeedError;

pub mod bots;
pub mod hestia;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Level {
    pub price: f64,
    pub quantity: u64,
}

impl Level {
    pub fn new(price: f64, quantity: u64) -> Self {
        Self { price, quantity }
    }
}

/// Bid and ask levels for a single product on a single tick.
///
/// Quantities are consumed in place by the matching engine. A level that reaches zero stays in
/// the side and is skipped when matching.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Depth {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub tick: u64,
    pub product: String,
}

impl Depth {
    /// Adds quantity at a price. If the side already has a level at that price the quantities are
    /// summed, otherwise a new level is inserted. The side is re-sorted after every insertion.
    pub fn add_level(&mut self, level: Level, side: Side) {
        let levels = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };

        if let Some(existing) = levels.iter_mut().find(|l| l.price == level.price) {
            existing.quantity += level.quantity;
        } else {
            levels.push(level);
        }
        self.sort_side(side);
    }

    fn sort_side(&mut self, side: Side) {
        //NaN prices are rejected on load so total_cmp only has to order real values
        match side {
            Side::Bid => self.bids.sort_by(|x, y| y.price.total_cmp(&x.price)),
            Side::Ask => self.asks.sort_by(|x, y| x.price.total_cmp(&y.price)),
        }
    }

    /// Puts both sides into priority order.
    pub fn sort(&mut self) {
        self.sort_side(Side::Bid);
        self.sort_side(Side::Ask);
    }

    pub fn side(&self, side: Side) -> &[Level] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub fn get_best_bid(&self) -> Option<&Level> {
        self.bids.first()
    }

    pub fn get_best_ask(&self) -> Option<&Level> {
        self.asks.first()
    }

    /// Quantity still available on a side after any matching on this tick.
    pub fn available(&self, side: Side) -> u64 {
        self.side(side).iter().map(|l| l.quantity).sum()
    }

    pub fn new(tick: u64, product: impl Into<String>) -> Self {
        Self {
            bids: vec![],
            asks: vec![],
            tick,
            product: product.into(),
        }
    }
}

/// Depth for every product on a single tick, keyed by product.
pub type TickDepth = HashMap<String, Depth>;

/// Source of depth for a run.
///
/// Ticks are a contiguous range starting at one. A feed can fail for an individual tick, the
/// caller decides whether that is recoverable.
pub trait DepthFeed {
    fn get_depth(&self, tick: u64) -> Result<TickDepth, FeedError>;
    fn last_tick(&self) -> u64;
}
