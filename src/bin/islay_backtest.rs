use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use log::info;

use islay::config::RunConfig;
use islay::input::bots::BotFlow;
use islay::input::hestia::Hestia;
use islay::simcontext::SimContextBuilder;
use islay::strategy;

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        return Err(anyhow!(
            "Usage: {} <config.json> <prices.csv> [bots.csv] [output.csv] [strategy]",
            args[0]
        ));
    }

    let config = RunConfig::from_file(Path::new(&args[1]))?;
    let source = Hestia::from_prices_csv(Path::new(&args[2]))?;
    let strategy_name = args.get(5).map(|s| s.as_str()).unwrap_or("fair_value");
    let strategy = strategy::from_name(strategy_name)?;

    let mut builder = SimContextBuilder::new();
    builder
        .with_feed(source)
        .with_config(config)
        .with_boxed_strategy(strategy);

    //Empty string skips the optional bot flow so an output path can still be given
    if let Some(bots_path) = args.get(3).filter(|p| !p.is_empty()) {
        builder.with_bots(BotFlow::from_csv(Path::new(bots_path))?);
    }

    let mut sim = builder.build()?;
    sim.run();

    let output = sim.output();
    let summary = output.summary();
    info!("{:?}", summary);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(output_path) = args.get(4) {
        output.to_csv_file(Path::new(output_path))?;
        info!("Wrote {} ticks to {}", output.records.len(), output_path);
    }
    Ok(())
}
