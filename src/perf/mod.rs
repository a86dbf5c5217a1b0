//! Run output: the ledger recorded after every tick, the fills that produced it, and anything that
//! was dropped along the way.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::exchange::islay::{Fill, Order};

/// Ledger state at the end of a tick.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TickRecord {
    pub tick: u64,
    pub cash: f64,
    pub positions: BTreeMap<String, i64>,
    pub pnl: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum RejectionKind {
    InvalidOrder,
    Misconfigured,
    StrategyFailure,
    FeedFailure,
}

/// Something the run recovered from. Orders are dropped, tick failures leave the ledger as it was
/// at the end of the previous tick.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Rejection {
    pub tick: u64,
    pub kind: RejectionKind,
    pub order: Option<Order>,
    pub reason: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Summary {
    pub ticks: usize,
    pub final_pnl: f64,
    pub max_drawdown: f64,
    pub fills: usize,
    pub traded_quantity: u64,
    pub rejections: usize,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BacktestOutput {
    pub records: Vec<TickRecord>,
    pub fills: Vec<Fill>,
    pub rejections: Vec<Rejection>,
}

impl BacktestOutput {
    /// Largest fall in pnl from a previous peak. Measured in cash rather than as a percentage
    /// because pnl can start at, or cross, zero.
    fn get_maxdd(values: &[f64]) -> f64 {
        let mut peak = f64::MIN;
        let mut maxdd = 0.0;
        for value in values {
            if *value > peak {
                peak = *value;
            } else if peak - value > maxdd {
                maxdd = peak - value;
            }
        }
        maxdd
    }

    pub fn summary(&self) -> Summary {
        let pnl: Vec<f64> = self.records.iter().map(|r| r.pnl).collect();
        Summary {
            ticks: self.records.len(),
            final_pnl: pnl.last().copied().unwrap_or_default(),
            max_drawdown: Self::get_maxdd(&pnl),
            fills: self.fills.len(),
            traded_quantity: self.fills.iter().map(|f| f.quantity).sum(),
            rejections: self.rejections.len(),
        }
    }

    /// Writes one row per tick: `tick,cash,pnl` followed by the position of every product.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let products: Vec<String> = self
            .records
            .first()
            .map(|r| r.positions.keys().cloned().collect())
            .unwrap_or_default();

        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec!["tick".to_string(), "cash".to_string(), "pnl".to_string()];
        header.extend(products.iter().cloned());
        wtr.write_record(&header)?;

        for record in &self.records {
            let mut row = vec![
                record.tick.to_string(),
                record.cash.to_string(),
                record.pnl.to_string(),
            ];
            for product in &products {
                let position = record.positions.get(product).copied().unwrap_or(0);
                row.push(position.to_string());
            }
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_file(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Could not create output {:?}", path))?;
        self.write_csv(file)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{BacktestOutput, TickRecord};

    fn record(tick: u64, pnl: f64, position: i64) -> TickRecord {
        let mut positions = BTreeMap::new();
        positions.insert("ABC".to_string(), position);
        positions.insert("BCD".to_string(), 0);
        TickRecord {
            tick,
            cash: pnl,
            positions,
            pnl,
        }
    }

    #[test]
    fn test_that_drawdown_is_measured_from_peak() {
        assert_eq!(BacktestOutput::get_maxdd(&[0.0, 10.0, 4.0, 12.0, 7.0]), 6.0);
        assert_eq!(BacktestOutput::get_maxdd(&[0.0, -5.0, -2.0]), 5.0);
        assert_eq!(BacktestOutput::get_maxdd(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(BacktestOutput::get_maxdd(&[]), 0.0);
    }

    #[test]
    fn test_that_summary_uses_last_record() {
        let output = BacktestOutput {
            records: vec![record(1, 0.0, 0), record(2, -3.0, 1), record(3, 5.0, 2)],
            fills: vec![],
            rejections: vec![],
        };
        let summary = output.summary();
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.final_pnl, 5.0);
        assert_eq!(summary.max_drawdown, 3.0);
    }

    #[test]
    fn test_that_csv_has_a_column_per_product() {
        let output = BacktestOutput {
            records: vec![record(1, 0.0, 0), record(2, -3.5, 4)],
            fills: vec![],
            rejections: vec![],
        };

        let mut buf: Vec<u8> = Vec::new();
        output.write_csv(&mut buf).unwrap();
        let written = String::from_utf8(buf).unwrap();

        assert_eq!(written, "tick,cash,pnl,ABC,BCD\n1,0,0,0,0\n2,-3.5,-3.5,4,0\n");
    }
}
