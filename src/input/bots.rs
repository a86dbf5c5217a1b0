use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{Depth, Level, Side, TickDepth};

/// Liquidity from market participants other than the strategy being tested.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct BotOrder {
    pub product: String,
    pub side: Side,
    pub price: f64,
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
struct BotRow {
    tick: u64,
    product: String,
    side: String,
    price: f64,
    quantity: i64,
}

fn parse_side(side: &str) -> Result<Side> {
    match side.to_ascii_lowercase().as_str() {
        "bid" | "buy" => Ok(Side::Bid),
        "ask" | "sell" => Ok(Side::Ask),
        other => Err(anyhow!("Unknown bot order side {:?}", other)),
    }
}

/// Auxiliary order flow keyed by tick. Merged into the depth of a tick before any strategy order
/// is matched against it.
#[derive(Clone, Debug, Default)]
pub struct BotFlow {
    inner: HashMap<u64, Vec<BotOrder>>,
}

impl BotFlow {
    pub fn add_order(&mut self, tick: u64, order: BotOrder) {
        self.inner.entry(tick).or_default().push(order);
    }

    pub fn get_orders(&self, tick: &u64) -> &[BotOrder] {
        self.inner.get(tick).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Adds the flow for `tick` into `depth`. Quantity at a price that already has a level is
    /// summed into that level, new prices become new levels. A product that has no depth on this
    /// tick gets a book created for it. Orders with no quantity are ignored.
    pub fn merge_into(&self, tick: u64, depth: &mut TickDepth) {
        for order in self.get_orders(&tick) {
            if order.quantity == 0 {
                continue;
            }
            debug!(
                "BOTS: Merging {:?} {} @ {} into {} at tick {}",
                order.side, order.quantity, order.price, order.product, tick
            );
            depth
                .entry(order.product.clone())
                .or_insert_with(|| Depth::new(tick, order.product.clone()))
                .add_level(Level::new(order.price, order.quantity), order.side);
        }
    }

    pub fn from_csv(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Could not open bot flow file {:?}", path))?;
        Self::from_reader(file).with_context(|| format!("Could not parse bot flow file {:?}", path))
    }

    /// Reads `tick;product;side;price;quantity` rows.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut flow = Self::new();
        for result in rdr.deserialize() {
            let row: BotRow = result?;
            if !row.price.is_finite() || row.price <= 0.0 {
                return Err(anyhow!(
                    "Invalid bot order price {} for {} at tick {}",
                    row.price,
                    row.product,
                    row.tick
                ));
            }
            let side = parse_side(&row.side)?;
            if row.quantity == 0 {
                debug!(
                    "BOTS: Skipping zero quantity order for {} at tick {}",
                    row.product, row.tick
                );
                continue;
            }
            flow.add_order(
                row.tick,
                BotOrder {
                    product: row.product,
                    side,
                    price: row.price,
                    quantity: row.quantity.unsigned_abs(),
                },
            );
        }

        info!("BOTS: Loaded bot flow for {} ticks", flow.inner.len());
        Ok(flow)
    }

    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }
}
