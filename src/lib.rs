//! # What is Islay?
//!
//! Islay replays historical snapshots of a limit order book tick by tick against orders produced
//! by a strategy and tracks the cash, inventory and profit/loss of a simulated portfolio. It is
//! intended for evaluating trading logic offline against recorded depth.
//!
//! # Implementation
//!
//! A backtest is composed of:
//! - An input, [Hestia](crate::input::hestia::Hestia) is the standard one. The input produces a
//! [TickDepth](crate::input::TickDepth) for every tick: the bid and ask levels of each product,
//! sorted so that the best price is always first. Auxiliary order flow from other market
//! participants, [BotFlow](crate::input::bots::BotFlow), can be merged into the depth before the
//! tick is matched.
//! - A matching engine, [Islay](crate::exchange::islay::Islay). The engine crosses a single
//! [Order](crate::exchange::islay::Order) against the opposing side of the depth, walking levels
//! in price priority and stopping at the first level that fails the limit price. Fills always
//! execute at the resting level's price.
//! - A [Ledger](crate::portfolio::Ledger) which owns cash, signed positions and position limits.
//! The ledger can only be mutated by the engine so every change in cash or position traces back
//! to a fill. The position limit is checked before every fill, not once per order.
//! - A [Strategy](crate::strategy::Strategy), the single entry point that user code implements.
//! - A [SimContext](crate::simcontext::SimContext) which drives the ticks in order and records the
//! ledger after each one.
//!
//! Islay is not an exchange simulation in the full sense: liquidity taken on a tick is not
//! restored until the next snapshot and unmatched order quantity is discarded rather than resting
//! in the book. There is no cancellation or amendment because orders never outlive a tick.
//!
//! # Running
//!
//! ```text
//! cargo run --bin islay_backtest [config.json] [prices.csv] [bots.csv] [output.csv] [strategy]
//! ```
//!
//! Pass `RUST_LOG=info` (or `debug` to see every fill) to see the run logged.
pub mod config;
pub mod error;
pub mod exchange;
pub mod input;
pub mod perf;
pub mod portfolio;
pub mod simcontext;
pub mod strategy;
