use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{MatchError, OrderError};
use crate::input::{Depth, Side, TickDepth};
use crate::portfolio::Ledger;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side of the book that an order on this side executes against.
    pub fn opposing(&self) -> Side {
        match self {
            OrderSide::Buy => Side::Ask,
            OrderSide::Sell => Side::Bid,
        }
    }
}

/// Intent to trade up to `quantity` of `product` at `limit_price` or better. Lives for a single
/// tick: whatever does not fill on that tick is discarded.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Order {
    pub product: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub limit_price: f64,
}

impl Order {
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.product.is_empty() {
            return Err(OrderError::EmptyProduct);
        }
        if self.quantity == 0 {
            return Err(OrderError::ZeroQuantity);
        }
        if !self.limit_price.is_finite() || self.limit_price <= 0.0 {
            return Err(OrderError::InvalidPrice {
                price: self.limit_price,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Limit is inclusive on both sides.
    fn is_marketable(&self, price: f64) -> bool {
        match self.side {
            OrderSide::Buy => price <= self.limit_price,
            OrderSide::Sell => price >= self.limit_price,
        }
    }

    /// Builds an order from a signed quantity: positive buys, negative sells. Zero produces an
    /// invalid order.
    pub fn from_signed(product: impl Into<String>, quantity: i64, limit_price: f64) -> Self {
        let side = if quantity < 0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        Self {
            product: product.into(),
            side,
            quantity: quantity.unsigned_abs(),
            limit_price,
        }
    }

    pub fn buy(product: impl Into<String>, quantity: u64, limit_price: f64) -> Self {
        Self {
            product: product.into(),
            side: OrderSide::Buy,
            quantity,
            limit_price,
        }
    }

    pub fn sell(product: impl Into<String>, quantity: u64, limit_price: f64) -> Self {
        Self {
            product: product.into(),
            side: OrderSide::Sell,
            quantity,
            limit_price,
        }
    }
}

/// Execution against a single resting level. `price` is always the level price.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Fill {
    pub tick: u64,
    pub product: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: u64,
}

impl Fill {
    pub fn value(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

/// Matching engine.
///
/// Orders are matched immediately against the depth passed in, there is no resting book. Depth is
/// consumed in place so two orders on the same tick never take the same liquidity.
#[derive(Debug, Default)]
pub struct Islay {
    trade_log: Vec<Fill>,
}

impl Islay {
    pub fn new() -> Self {
        Self {
            trade_log: Vec::new(),
        }
    }

    pub fn get_trade_log(&self) -> &[Fill] {
        &self.trade_log
    }

    pub fn take_trade_log(&mut self) -> Vec<Fill> {
        std::mem::take(&mut self.trade_log)
    }

    /// Walks the opposing side of `book` in priority order. Stops at the first level that fails
    /// the limit price or once the position limit leaves no headroom. Levels already emptied on
    /// this tick are skipped.
    fn fill_order(order: &Order, book: &mut Depth, ledger: &mut Ledger) -> Vec<Fill> {
        book.sort();

        let tick = book.tick;
        let levels = match order.side.opposing() {
            Side::Ask => &mut book.asks,
            Side::Bid => &mut book.bids,
        };

        let mut to_fill = order.quantity;
        let mut fills = Vec::new();

        for level in levels.iter_mut() {
            if level.quantity == 0 {
                continue;
            }

            if !order.is_marketable(level.price) {
                break;
            }

            let headroom = ledger.headroom(&order.product, order.side).unwrap_or(0);
            if headroom <= 0 {
                debug!(
                    "ENGINE: Position limit reached for {}, discarding {} of {:?}",
                    order.product, to_fill, order
                );
                break;
            }

            let qty = to_fill.min(headroom as u64).min(level.quantity);
            level.quantity -= qty;
            to_fill -= qty;

            let fill = Fill {
                tick,
                product: order.product.clone(),
                side: order.side,
                price: level.price,
                quantity: qty,
            };
            ledger.apply_fill(&fill);
            fills.push(fill);

            if to_fill == 0 {
                break;
            }
        }
        fills
    }

    /// Matches `order` against the depth for its product and settles every fill into `ledger`.
    /// Returns the quantity filled, which may be zero.
    ///
    /// Nothing is mutated if the order is invalid, the product has no position limit, or the
    /// product has no depth on this tick.
    pub fn match_order(
        &mut self,
        order: &Order,
        depth: &mut TickDepth,
        ledger: &mut Ledger,
    ) -> Result<u64, MatchError> {
        order.validate()?;

        if ledger.get_limit(&order.product).is_none() {
            return Err(MatchError::NoPositionLimit {
                product: order.product.clone(),
            });
        }

        let Some(book) = depth.get_mut(&order.product) else {
            return Err(MatchError::UnknownProduct {
                product: order.product.clone(),
            });
        };

        let fills = Self::fill_order(order, book, ledger);
        let filled: u64 = fills.iter().map(|f| f.quantity).sum();

        if filled < order.quantity {
            debug!(
                "ENGINE: Filled {} of {:?}, remaining {} discarded",
                filled,
                order,
                order.quantity - filled
            );
        }
        if filled == 0 && book.available(order.side.opposing()) == 0 {
            warn!(
                "ENGINE: No liquidity left on {:?} side of {} for {:?}",
                order.side.opposing(),
                order.product,
                order
            );
        }

        self.trade_log.extend(fills);
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::{Islay, Order, OrderSide};
    use crate::error::{MatchError, OrderError};
    use crate::input::{Depth, Level, Side, TickDepth};
    use crate::portfolio::Ledger;

    fn setup(asks: Vec<(f64, u64)>, bids: Vec<(f64, u64)>) -> TickDepth {
        let mut book = Depth::new(1, "ABC");
        for (price, qty) in asks {
            book.add_level(Level::new(price, qty), Side::Ask);
        }
        for (price, qty) in bids {
            book.add_level(Level::new(price, qty), Side::Bid);
        }
        let mut depth: TickDepth = HashMap::new();
        depth.insert("ABC".to_string(), book);
        depth
    }

    fn ledger(limit: u64) -> Ledger {
        let mut limits = BTreeMap::new();
        limits.insert("ABC".to_string(), limit);
        Ledger::new(0.0, limits)
    }

    #[test]
    fn test_that_buy_walks_asks_from_lowest_price() {
        let mut depth = setup(vec![(10.0, 4), (9.0, 3)], vec![]);
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        let filled = exchange
            .match_order(&Order::buy("ABC", 5, 10.0), &mut depth, &mut ledger)
            .unwrap();

        assert_eq!(filled, 5);
        let trades = exchange.get_trade_log();
        assert_eq!(trades.len(), 2);
        assert_eq!((trades[0].price, trades[0].quantity), (9.0, 3));
        assert_eq!((trades[1].price, trades[1].quantity), (10.0, 2));
        assert_eq!(ledger.get_position("ABC"), 5);
        assert_eq!(ledger.get_cash(), -47.0);

        let book = depth.get("ABC").unwrap();
        assert_eq!(book.asks, vec![Level::new(9.0, 0), Level::new(10.0, 2)]);
    }

    #[test]
    fn test_that_sell_walks_bids_from_highest_price() {
        let mut depth = setup(vec![], vec![(8.0, 5), (9.0, 2)]);
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        let filled = exchange
            .match_order(&Order::sell("ABC", 4, 8.0), &mut depth, &mut ledger)
            .unwrap();

        assert_eq!(filled, 4);
        let trades = exchange.get_trade_log();
        assert_eq!((trades[0].price, trades[0].quantity), (9.0, 2));
        assert_eq!((trades[1].price, trades[1].quantity), (8.0, 2));
        assert_eq!(ledger.get_position("ABC"), -4);
        assert_eq!(ledger.get_cash(), 34.0);
    }

    #[test]
    fn test_that_fill_is_capped_by_position_limit() {
        let mut depth = setup(vec![(10.0, 10), (10.5, 10)], vec![(9.0, 30)]);
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        exchange
            .match_order(&Order::sell("ABC", 2, 9.0), &mut depth, &mut ledger)
            .unwrap();
        exchange
            .match_order(&Order::buy("ABC", 20, 10.0), &mut depth, &mut ledger)
            .unwrap();
        assert_eq!(ledger.get_position("ABC"), 8);

        //Level at 10.0 is exhausted and 10.5 is priced out
        let filled = exchange
            .match_order(&Order::buy("ABC", 5, 10.0), &mut depth, &mut ledger)
            .unwrap();
        assert_eq!(filled, 0);

        let filled = exchange
            .match_order(&Order::buy("ABC", 15, 11.0), &mut depth, &mut ledger)
            .unwrap();
        assert_eq!(filled, 10);
        assert_eq!(ledger.get_position("ABC"), 18);

        let mut depth = setup(vec![(10.0, 10)], vec![]);
        let filled = exchange
            .match_order(&Order::buy("ABC", 5, 10.0), &mut depth, &mut ledger)
            .unwrap();
        assert_eq!(filled, 2);
        assert_eq!(ledger.get_position("ABC"), 20);
        assert_eq!(depth.get("ABC").unwrap().asks[0].quantity, 8);
    }

    #[test]
    fn test_that_limit_holds_across_levels_and_short_can_be_covered() {
        let mut depth = setup(vec![(10.0, 15), (11.0, 30)], vec![(9.0, 15), (8.0, 30)]);
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        let filled = exchange
            .match_order(&Order::sell("ABC", 50, 1.0), &mut depth, &mut ledger)
            .unwrap();
        assert_eq!(filled, 20);
        assert_eq!(ledger.get_position("ABC"), -20);

        let filled = exchange
            .match_order(&Order::buy("ABC", 50, 100.0), &mut depth, &mut ledger)
            .unwrap();
        assert_eq!(filled, 40);
        assert_eq!(ledger.get_position("ABC"), 20);

        for trade in exchange.get_trade_log() {
            assert!(trade.quantity > 0);
        }
    }

    #[test]
    fn test_that_non_marketable_order_does_nothing() {
        let mut depth = setup(vec![(9.0, 3)], vec![]);
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        let filled = exchange
            .match_order(&Order::buy("ABC", 5, 5.0), &mut depth, &mut ledger)
            .unwrap();

        assert_eq!(filled, 0);
        assert!(exchange.get_trade_log().is_empty());
        assert_eq!(depth.get("ABC").unwrap().asks, vec![Level::new(9.0, 3)]);
        assert_eq!(ledger.get_cash(), 0.0);
        assert_eq!(ledger.get_position("ABC"), 0);
    }

    #[test]
    fn test_that_invalid_order_is_rejected_without_mutation() {
        let mut depth = setup(vec![(9.0, 3)], vec![]);
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        let res = exchange.match_order(&Order::buy("ABC", 0, 10.0), &mut depth, &mut ledger);
        assert_eq!(
            res,
            Err(MatchError::InvalidOrder {
                reason: OrderError::ZeroQuantity
            })
        );

        let res = exchange.match_order(&Order::buy("ABC", 1, -1.0), &mut depth, &mut ledger);
        assert!(matches!(res, Err(MatchError::InvalidOrder { .. })));

        assert_eq!(depth.get("ABC").unwrap().asks[0].quantity, 3);
        assert_eq!(ledger.get_cash(), 0.0);
    }

    #[test]
    fn test_that_limit_price_is_inclusive() {
        let mut depth = setup(vec![(10.0, 3)], vec![]);
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        let filled = exchange
            .match_order(&Order::buy("ABC", 3, 10.0), &mut depth, &mut ledger)
            .unwrap();
        assert_eq!(filled, 3);
        assert_eq!(ledger.get_cash(), -30.0);
        assert_eq!(depth.get("ABC").unwrap().asks[0].quantity, 0);
    }

    #[test]
    fn test_that_execution_is_at_resting_price_not_limit() {
        let mut depth = setup(vec![(9.0, 3)], vec![(11.0, 3)]);
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        exchange
            .match_order(&Order::buy("ABC", 3, 50.0), &mut depth, &mut ledger)
            .unwrap();
        exchange
            .match_order(&Order::sell("ABC", 3, 1.0), &mut depth, &mut ledger)
            .unwrap();

        assert_eq!(ledger.get_cash(), 6.0);
        assert_eq!(ledger.get_position("ABC"), 0);
    }

    #[test]
    fn test_that_repeated_orders_do_not_use_same_liquidity() {
        let mut depth = setup(vec![(10.0, 4), (11.0, 4)], vec![]);
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        let first = exchange
            .match_order(&Order::buy("ABC", 4, 10.0), &mut depth, &mut ledger)
            .unwrap();
        let second = exchange
            .match_order(&Order::buy("ABC", 4, 10.0), &mut depth, &mut ledger)
            .unwrap();
        //Emptied level is skipped, the next level is priced out
        let third = exchange
            .match_order(&Order::buy("ABC", 4, 11.0), &mut depth, &mut ledger)
            .unwrap();

        assert_eq!((first, second, third), (4, 0, 4));
        assert_eq!(depth.get("ABC").unwrap().asks.len(), 2);
    }

    #[test]
    fn test_that_unsorted_depth_is_matched_in_priority_order() {
        let mut book = Depth::new(1, "ABC");
        book.asks = vec![Level::new(12.0, 2), Level::new(10.0, 2)];
        let mut depth: TickDepth = HashMap::new();
        depth.insert("ABC".to_string(), book);

        let mut ledger = ledger(20);
        let mut exchange = Islay::new();
        let filled = exchange
            .match_order(&Order::buy("ABC", 2, 12.0), &mut depth, &mut ledger)
            .unwrap();

        assert_eq!(filled, 2);
        assert_eq!(exchange.get_trade_log()[0].price, 10.0);
    }

    #[test]
    fn test_that_missing_limit_and_missing_depth_are_errors() {
        let mut depth = setup(vec![(10.0, 3)], vec![]);
        depth.insert("XYZ".to_string(), Depth::new(1, "XYZ"));
        let mut ledger = ledger(20);
        let mut exchange = Islay::new();

        let res = exchange.match_order(&Order::buy("XYZ", 1, 10.0), &mut depth, &mut ledger);
        assert_eq!(
            res,
            Err(MatchError::NoPositionLimit {
                product: "XYZ".to_string()
            })
        );

        let mut limits = BTreeMap::new();
        limits.insert("ABC".to_string(), 20);
        limits.insert("BCD".to_string(), 20);
        let mut ledger = Ledger::new(0.0, limits);
        let res = exchange.match_order(&Order::buy("BCD", 1, 10.0), &mut depth, &mut ledger);
        assert_eq!(
            res,
            Err(MatchError::UnknownProduct {
                product: "BCD".to_string()
            })
        );
        assert_eq!(ledger.get_position("BCD"), 0);
    }

    #[test]
    fn test_that_matching_leaves_other_products_untouched() {
        let mut depth = setup(vec![(10.0, 3)], vec![]);
        let mut other = Depth::new(1, "BCD");
        other.add_level(Level::new(10.0, 3), Side::Ask);
        depth.insert("BCD".to_string(), other);

        let mut limits = BTreeMap::new();
        limits.insert("ABC".to_string(), 20);
        limits.insert("BCD".to_string(), 20);
        let mut ledger = Ledger::new(0.0, limits);
        let mut exchange = Islay::new();

        exchange
            .match_order(&Order::buy("ABC", 3, 10.0), &mut depth, &mut ledger)
            .unwrap();

        assert_eq!(depth.get("BCD").unwrap().asks[0].quantity, 3);
        assert_eq!(ledger.get_position("BCD"), 0);
    }

    #[test]
    fn test_that_unbounded_limits_still_fill() {
        let mut depth = setup(vec![(10.0, 5)], vec![(9.0, 5)]);
        let mut unlimited = ledger(u64::MAX);
        let mut exchange = Islay::new();

        let filled = exchange
            .match_order(&Order::buy("ABC", 3, 10.0), &mut depth, &mut unlimited)
            .unwrap();
        assert_eq!(filled, 3);

        let mut depth = setup(vec![(10.0, 5)], vec![(9.0, 5)]);
        let mut widest = ledger(i64::MAX as u64);
        exchange
            .match_order(&Order::sell("ABC", 1, 9.0), &mut depth, &mut widest)
            .unwrap();
        let filled = exchange
            .match_order(&Order::buy("ABC", 1, 10.0), &mut depth, &mut widest)
            .unwrap();
        assert_eq!(filled, 1);
        assert_eq!(widest.get_position("ABC"), 0);
    }

    #[test]
    fn test_that_zero_limit_never_fills() {
        let mut depth = setup(vec![(10.0, 5)], vec![(9.0, 5)]);
        let mut ledger = ledger(0);
        let mut exchange = Islay::new();

        let bought = exchange
            .match_order(&Order::buy("ABC", 3, 10.0), &mut depth, &mut ledger)
            .unwrap();
        let sold = exchange
            .match_order(&Order::sell("ABC", 3, 9.0), &mut depth, &mut ledger)
            .unwrap();

        assert_eq!((bought, sold), (0, 0));
        assert!(exchange.get_trade_log().is_empty());
        let book = depth.get("ABC").unwrap();
        assert_eq!(book.asks, vec![Level::new(10.0, 5)]);
        assert_eq!(book.bids, vec![Level::new(9.0, 5)]);
        assert_eq!(ledger.get_cash(), 0.0);
    }

    #[test]
    fn test_that_signed_quantity_gives_side() {
        let buy = Order::from_signed("ABC", 5, 10.0);
        let sell = Order::from_signed("ABC", -5, 10.0);
        assert_eq!((buy.side, buy.quantity), (OrderSide::Buy, 5));
        assert_eq!((sell.side, sell.quantity), (OrderSide::Sell, 5));
        assert!(!Order::from_signed("ABC", 0, 10.0).is_valid());
        assert_eq!(
            Order::buy("", 1, 10.0).validate(),
            Err(OrderError::EmptyProduct)
        );
        assert!(!Order::buy("ABC", 1, f64::NAN).is_valid());
    }
}
