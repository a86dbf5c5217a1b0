//! Generates orders
//!
//! A strategy sees the depth of the current tick and the list of products tracked by the run and
//! returns the orders it wants matched, in the order they should be matched. It never sees the
//! ledger directly: fills are settled by the exchange and the next tick's depth is all a strategy
//! is given.

pub mod fairvalue;

use anyhow::{anyhow, Result};

use crate::exchange::islay::Order;
use crate::input::TickDepth;

pub use fairvalue::FairValueStrategy;

/// Single entry point for user trading logic. Called at most once per tick.
///
/// Returning an error, or panicking, causes the tick to be skipped with the ledger unchanged. The
/// run carries on with the next tick.
pub trait Strategy: Send {
    fn run(&mut self, depth: &TickDepth, products: &[String]) -> Result<Vec<Order>>;
}

/// Strategy that never trades. Useful as a baseline: pnl stays at initial cash.
#[derive(Clone, Debug, Default)]
pub struct IdleStrategy;

impl Strategy for IdleStrategy {
    fn run(&mut self, _depth: &TickDepth, _products: &[String]) -> Result<Vec<Order>> {
        Ok(Vec::new())
    }
}

impl<F> Strategy for F
where
    F: FnMut(&TickDepth, &[String]) -> Result<Vec<Order>> + Send,
{
    fn run(&mut self, depth: &TickDepth, products: &[String]) -> Result<Vec<Order>> {
        self(depth, products)
    }
}

/// Looks up one of the strategies shipped with the library by name.
pub fn from_name(name: &str) -> Result<Box<dyn Strategy>> {
    match name {
        "fair_value" => Ok(Box::new(FairValueStrategy::default())),
        "idle" => Ok(Box::new(IdleStrategy)),
        other => Err(anyhow!("Unknown strategy {:?}", other)),
    }
}
