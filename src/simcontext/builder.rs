use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::config::RunConfig;
use crate::exchange::islay::Islay;
use crate::input::bots::BotFlow;
use crate::input::DepthFeed;
use crate::portfolio::Ledger;
use crate::strategy::Strategy;

use super::{SimContext, TickState};

pub struct SimContextBuilder<F>
where
    F: DepthFeed,
{
    feed: Option<F>,
    bots: Option<BotFlow>,
    strategy: Option<Box<dyn Strategy>>,
    config: Option<RunConfig>,
}

impl<F> Default for SimContextBuilder<F>
where
    F: DepthFeed,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<F> SimContextBuilder<F>
where
    F: DepthFeed,
{
    pub fn with_feed(&mut self, feed: F) -> &mut Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_bots(&mut self, bots: BotFlow) -> &mut Self {
        self.bots = Some(bots);
        self
    }

    pub fn with_strategy<S>(&mut self, strategy: S) -> &mut Self
    where
        S: Strategy + 'static,
    {
        self.strategy = Some(Box::new(strategy));
        self
    }

    pub fn with_boxed_strategy(&mut self, strategy: Box<dyn Strategy>) -> &mut Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_config(&mut self, config: RunConfig) -> &mut Self {
        self.config = Some(config);
        self
    }

    //Configuration is checked here rather than on the first tick so that a bad config fails the
    //run before anything is recorded
    pub fn build(&mut self) -> Result<SimContext<F>> {
        let feed = self
            .feed
            .take()
            .ok_or_else(|| anyhow!("SimContext must be built with a feed"))?;
        let strategy = self
            .strategy
            .take()
            .ok_or_else(|| anyhow!("SimContext must be built with a strategy"))?;
        let config = self
            .config
            .take()
            .ok_or_else(|| anyhow!("SimContext must be built with a config"))?;
        config.validate()?;

        Ok(SimContext {
            feed,
            bots: self.bots.take(),
            strategy,
            exchange: Islay::new(),
            ledger: Ledger::from_config(&config),
            products: config.products(),
            marks: HashMap::new(),
            next_tick: 1,
            state: TickState::Pending,
            records: Vec::new(),
            rejections: Vec::new(),
        })
    }

    pub fn new() -> Self {
        Self {
            feed: None,
            bots: None,
            strategy: None,
            config: None,
        }
    }
}
