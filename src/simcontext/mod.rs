//! Running context for backtest

mod builder;

pub use builder::SimContextBuilder;

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, error, info, trace, warn};

use crate::error::MatchError;
use crate::exchange::islay::{Fill, Islay, Order};
use crate::input::bots::BotFlow;
use crate::input::{DepthFeed, TickDepth};
use crate::perf::{BacktestOutput, Rejection, RejectionKind, TickRecord};
use crate::portfolio::{marks, Ledger};
use crate::strategy::Strategy;

/// Stages a tick passes through, in order. A tick whose depth cannot be fetched, or whose
/// strategy fails, goes straight to `Recorded`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickState {
    Pending,
    SnapshotReady,
    StrategyInvoked,
    OrdersValidated,
    Matching,
    LedgerUpdated,
    Recorded,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "strategy panicked".to_string()
    }
}

/// Context for a single run.
///
/// Ticks are processed strictly in order because every tick starts from the ledger the previous
/// tick left behind. The context owns its ledger and depth so separate runs share nothing and can
/// be moved onto separate threads.
pub struct SimContext<F>
where
    F: DepthFeed,
{
    feed: F,
    bots: Option<BotFlow>,
    strategy: Box<dyn Strategy>,
    exchange: Islay,
    ledger: Ledger,
    products: Vec<String>,
    //Last known mark of each product, carried over ticks where the product has no depth
    marks: HashMap<String, f64>,
    next_tick: u64,
    state: TickState,
    records: Vec<TickRecord>,
    rejections: Vec<Rejection>,
}

impl<F> SimContext<F>
where
    F: DepthFeed,
{
    pub fn has_next(&self) -> bool {
        self.next_tick <= self.feed.last_tick()
    }

    pub fn get_ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn get_state(&self) -> TickState {
        self.state
    }

    pub fn get_records(&self) -> &[TickRecord] {
        &self.records
    }

    pub fn get_rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    pub fn get_trade_log(&self) -> &[Fill] {
        self.exchange.get_trade_log()
    }

    fn transition(&mut self, tick: u64, state: TickState) {
        trace!("SIM: Tick {} {:?} -> {:?}", tick, self.state, state);
        self.state = state;
    }

    fn reject(&mut self, tick: u64, kind: RejectionKind, order: Option<Order>, reason: String) {
        self.rejections.push(Rejection {
            tick,
            kind,
            order,
            reason,
        });
    }

    fn record(&mut self, tick: u64) -> &TickRecord {
        let record = TickRecord {
            tick,
            cash: self.ledger.get_cash(),
            positions: self.ledger.get_positions().clone(),
            pnl: self.ledger.pnl_with_marks(&self.marks),
        };
        debug!(
            "SIM: Recorded tick {}, cash {}, pnl {}",
            tick, record.cash, record.pnl
        );
        self.records.push(record);
        self.transition(tick, TickState::Recorded);
        &self.records[self.records.len() - 1]
    }

    fn fetch_depth(&mut self, tick: u64) -> Option<TickDepth> {
        match self.feed.get_depth(tick) {
            Ok(mut depth) => {
                if let Some(bots) = &self.bots {
                    bots.merge_into(tick, &mut depth);
                }
                for book in depth.values_mut() {
                    book.sort();
                }
                Some(depth)
            }
            Err(e) => {
                error!("SIM: Could not fetch depth for tick {}: {}", tick, e);
                self.reject(tick, RejectionKind::FeedFailure, None, e.to_string());
                None
            }
        }
    }

    fn invoke_strategy(&mut self, tick: u64, depth: &TickDepth) -> Option<Vec<Order>> {
        let strategy = &mut self.strategy;
        let products = &self.products;
        let result = catch_unwind(AssertUnwindSafe(|| strategy.run(depth, products)));

        let reason = match result {
            Ok(Ok(orders)) => return Some(orders),
            Ok(Err(e)) => format!("{:#}", e),
            Err(payload) => panic_message(payload),
        };
        error!("SIM: Strategy failed on tick {}: {}", tick, reason);
        self.reject(tick, RejectionKind::StrategyFailure, None, reason);
        None
    }

    fn validate_orders(&mut self, tick: u64, orders: Vec<Order>) -> Vec<Order> {
        let mut valid = Vec::with_capacity(orders.len());
        for order in orders {
            match order.validate() {
                Ok(()) => valid.push(order),
                Err(e) => {
                    warn!("SIM: Dropping invalid order {:?} on tick {}: {}", order, tick, e);
                    self.reject(tick, RejectionKind::InvalidOrder, Some(order), e.to_string());
                }
            }
        }
        valid
    }

    /// Runs the next tick. Returns `None` once the feed is exhausted.
    pub fn tick(&mut self) -> Option<&TickRecord> {
        if !self.has_next() {
            return None;
        }
        let tick = self.next_tick;
        self.next_tick += 1;
        self.transition(tick, TickState::Pending);

        let Some(mut depth) = self.fetch_depth(tick) else {
            return Some(self.record(tick));
        };
        self.marks.extend(marks(&depth));
        self.transition(tick, TickState::SnapshotReady);

        let Some(orders) = self.invoke_strategy(tick, &depth) else {
            return Some(self.record(tick));
        };
        self.transition(tick, TickState::StrategyInvoked);

        let orders = self.validate_orders(tick, orders);
        self.transition(tick, TickState::OrdersValidated);

        self.transition(tick, TickState::Matching);
        for order in orders {
            match self
                .exchange
                .match_order(&order, &mut depth, &mut self.ledger)
            {
                Ok(filled) => {
                    debug!("SIM: Tick {} filled {} of {:?}", tick, filled, order);
                }
                Err(e) => {
                    let kind = match e {
                        MatchError::InvalidOrder { .. } => RejectionKind::InvalidOrder,
                        _ => RejectionKind::Misconfigured,
                    };
                    error!("SIM: Could not match {:?} on tick {}: {}", order, tick, e);
                    self.reject(tick, kind, Some(order), e.to_string());
                }
            }
        }
        self.transition(tick, TickState::LedgerUpdated);

        Some(self.record(tick))
    }

    pub fn run(&mut self) {
        info!(
            "SIM: Starting run over {} ticks for {:?}",
            self.feed.last_tick(),
            self.products
        );
        while self.tick().is_some() {}
        info!(
            "SIM: Finished run, cash {}, positions {:?}, {} fills, {} rejections",
            self.ledger.get_cash(),
            self.ledger.get_positions(),
            self.exchange.get_trade_log().len(),
            self.rejections.len()
        );
    }

    /// Consumes the context. Intended to be called at end of simulation but valid at any point:
    /// every recorded tick is complete.
    pub fn output(mut self) -> BacktestOutput {
        BacktestOutput {
            records: std::mem::take(&mut self.records),
            fills: self.exchange.take_trade_log(),
            rejections: std::mem::take(&mut self.rejections),
        }
    }
}
