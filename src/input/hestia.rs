use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use rand::thread_rng;
use rand_distr::{Distribution, Uniform};
use serde::Deserialize;

use super::{Depth, DepthFeed, Level, Side, TickDepth};
use crate::error::FeedError;

/// One row of the semicolon-delimited order depth export. Any of the three levels on either side
/// can be empty. Columns that are not listed here, such as `mid_price`, are ignored.
#[derive(Debug, Deserialize)]
struct PriceRow {
    day: i64,
    timestamp: i64,
    product: String,
    bid_price_1: Option<f64>,
    bid_volume_1: Option<i64>,
    bid_price_2: Option<f64>,
    bid_volume_2: Option<i64>,
    bid_price_3: Option<f64>,
    bid_volume_3: Option<i64>,
    ask_price_1: Option<f64>,
    ask_volume_1: Option<i64>,
    ask_price_2: Option<f64>,
    ask_volume_2: Option<i64>,
    ask_price_3: Option<f64>,
    ask_volume_3: Option<i64>,
}

impl PriceRow {
    fn levels(&self) -> Vec<(Side, Option<f64>, Option<i64>)> {
        vec![
            (Side::Bid, self.bid_price_1, self.bid_volume_1),
            (Side::Bid, self.bid_price_2, self.bid_volume_2),
            (Side::Bid, self.bid_price_3, self.bid_volume_3),
            (Side::Ask, self.ask_price_1, self.ask_volume_1),
            (Side::Ask, self.ask_price_2, self.ask_volume_2),
            (Side::Ask, self.ask_price_3, self.ask_volume_3),
        ]
    }
}

/// Tick-indexed depth source.
///
/// Every call to [get_depth](DepthFeed::get_depth) returns a fresh copy of the recorded depth so
/// liquidity consumed on one tick is never visible on another.
#[derive(Clone, Debug)]
pub struct Hestia {
    inner: HashMap<u64, TickDepth>,
    last_tick: u64,
}

impl Hestia {
    pub fn get_quotes(&self, tick: &u64) -> Option<&TickDepth> {
        self.inner.get(tick)
    }

    pub fn get_best_ask(&self, tick: &u64, product: &str) -> Option<&Level> {
        self.inner.get(tick)?.get(product)?.get_best_ask()
    }

    pub fn get_best_bid(&self, tick: &u64, product: &str) -> Option<&Level> {
        self.inner.get(tick)?.get(product)?.get_best_bid()
    }

    pub fn products(&self) -> BTreeSet<String> {
        self.inner
            .values()
            .flat_map(|depths| depths.keys().cloned())
            .collect()
    }

    /// Adds an empty book for a product so that the product is present on a tick even if no
    /// levels were recorded for it.
    pub fn add_product(&mut self, tick: u64, product: &str) {
        self.inner
            .entry(tick)
            .or_default()
            .entry(product.to_string())
            .or_insert_with(|| Depth::new(tick, product));
        self.last_tick = self.last_tick.max(tick);
    }

    pub fn add_price_level(&mut self, tick: u64, product: &str, level: Level, side: Side) {
        self.add_product(tick, product);
        if let Some(depth) = self
            .inner
            .get_mut(&tick)
            .and_then(|depths| depths.get_mut(product))
        {
            depth.add_level(level, side);
        }
    }

    pub fn from_prices_csv(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Could not open prices file {:?}", path))?;
        Self::from_reader(file).with_context(|| format!("Could not parse prices file {:?}", path))
    }

    /// Parses the order depth export. Rows are grouped by `(day, timestamp)` and each group is
    /// numbered as a tick, starting from one, in time order.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows: Vec<PriceRow> = Vec::new();
        for result in rdr.deserialize() {
            let row: PriceRow = result?;
            rows.push(row);
        }

        let times: BTreeSet<(i64, i64)> = rows.iter().map(|r| (r.day, r.timestamp)).collect();
        let ticks: HashMap<(i64, i64), u64> = times
            .into_iter()
            .enumerate()
            .map(|(i, time)| (time, i as u64 + 1))
            .collect();

        let mut source = Self::new();
        for row in &rows {
            let tick = ticks[&(row.day, row.timestamp)];
            source.add_product(tick, &row.product);

            for (side, price, volume) in row.levels() {
                let (Some(price), Some(volume)) = (price, volume) else {
                    continue;
                };

                if !price.is_finite() || price <= 0.0 {
                    warn!(
                        "HESTIA: Skipping level with invalid price {:?} for {} at tick {}",
                        price, row.product, tick
                    );
                    continue;
                }

                let quantity = volume.unsigned_abs();
                if quantity == 0 {
                    continue;
                }
                source.add_price_level(tick, &row.product, Level::new(price, quantity), side);
            }
        }

        info!(
            "HESTIA: Loaded {} ticks for {} products",
            source.last_tick,
            source.products().len()
        );
        Ok(source)
    }

    pub fn random(length: u64, products: Vec<&str>) -> Self {
        let price_dist = Uniform::new(90.0, 100.0);
        let size_dist = Uniform::new(1_u64, 50_u64);
        let mut rng = thread_rng();

        let mut source = Self::new();

        for tick in 1..=length {
            for product in &products {
                let random_price: f64 = price_dist.sample(&mut rng);
                for step in 1..=3 {
                    let offset = step as f64 * 0.01;
                    let bid_level = Level::new(
                        (random_price * (1.0 - offset)).round(),
                        size_dist.sample(&mut rng),
                    );
                    let ask_level = Level::new(
                        (random_price * (1.0 + offset)).round(),
                        size_dist.sample(&mut rng),
                    );
                    source.add_price_level(tick, product, bid_level, Side::Bid);
                    source.add_price_level(tick, product, ask_level, Side::Ask);
                }
            }
        }
        source
    }

    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
            last_tick: 0,
        }
    }
}

impl Default for Hestia {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthFeed for Hestia {
    fn get_depth(&self, tick: u64) -> Result<TickDepth, FeedError> {
        self.inner
            .get(&tick)
            .cloned()
            .ok_or(FeedError::MissingTick { tick })
    }

    fn last_tick(&self) -> u64 {
        self.last_tick
    }
}
