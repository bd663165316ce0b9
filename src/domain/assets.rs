//! The collection of tracked assets and the per-tick processing sequence.

use std::collections::BTreeMap;

use super::account::symbol_to_asset;
use super::asset::{Asset, FillEvent};
use super::error::PeakTrailError;
use super::kline::KlineInterval;
use super::kline_store::{AppendStats, KlineStore};
use super::strategy::StrategyConfig;
use crate::ports::exchange_port::ExchangePort;
use crate::ports::storage_port::PartitionStorage;

/// Outcome of one `process` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub as_of_time: i64,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub fills: Vec<FillEvent>,
    pub orders_placed: usize,
}

/// Outcome of one `sync_historical_klines` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub synced: Vec<(String, AppendStats)>,
    pub failed: Vec<(String, String)>,
}

impl SyncReport {
    pub fn stats(&self, name: &str) -> Option<&AppendStats> {
        self.synced
            .iter()
            .find(|(asset, _)| asset == name)
            .map(|(_, stats)| stats)
    }
}

pub struct Assets {
    assets: BTreeMap<String, Asset>,
    quote_asset: String,
    current_as_of_time: Option<i64>,
}

impl Assets {
    pub fn new(quote_asset: &str) -> Self {
        Assets {
            assets: BTreeMap::new(),
            quote_asset: quote_asset.to_string(),
            current_as_of_time: None,
        }
    }

    /// One asset per account balance other than the quote asset, each backed
    /// by the storage `open_storage` returns for its name.
    pub fn from_account<F>(
        exchange: &dyn ExchangePort,
        quote_asset: &str,
        config: &StrategyConfig,
        mut open_storage: F,
    ) -> Result<Self, PeakTrailError>
    where
        F: FnMut(&str) -> Result<Box<dyn PartitionStorage>, PeakTrailError>,
    {
        let account = exchange.get_account()?;
        let mut assets = Assets::new(quote_asset);
        for balance in account
            .balances
            .iter()
            .filter(|b| b.asset != quote_asset)
        {
            let store = KlineStore::new(&balance.asset, open_storage(&balance.asset)?);
            assets.insert(Asset::from_config(balance, quote_asset, store, config));
        }
        tracing::info!("Tracking {} assets quoted in {}", assets.len(), quote_asset);
        Ok(assets)
    }

    pub fn insert(&mut self, asset: Asset) {
        self.assets.insert(asset.name().to_string(), asset);
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Asset> {
        self.assets.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.assets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn quote_asset(&self) -> &str {
        &self.quote_asset
    }

    pub fn current_as_of_time(&self) -> Option<i64> {
        self.current_as_of_time
    }

    /// Fetch klines newer than each store's last close time and append them.
    /// An asset whose store or fetch fails is reported and the rest still sync.
    pub fn sync_historical_klines(
        &mut self,
        exchange: &dyn ExchangePort,
        interval: KlineInterval,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for (name, asset) in self.assets.iter_mut() {
            match sync_asset(asset, exchange, interval) {
                Ok(stats) => report.synced.push((name.clone(), stats)),
                Err(e) => {
                    tracing::error!("Syncing klines for {} failed: {}", name, e);
                    report.failed.push((name.clone(), e.to_string()));
                }
            }
        }
        report
    }

    /// Hand each 24 hour ticker to its asset. Returns how many were matched.
    pub fn update_tickers(&mut self, exchange: &dyn ExchangePort) -> Result<usize, PeakTrailError> {
        let mut matched = 0;
        for ticker in exchange.get_ticker()? {
            let Some(name) = symbol_to_asset(&ticker.symbol, &self.quote_asset) else {
                continue;
            };
            if let Some(asset) = self.assets.get_mut(name) {
                asset.update_24_hour_ticker(ticker);
                matched += 1;
            }
        }
        Ok(matched)
    }

    /// Run one tick: update every asset from its store, then check fills and
    /// place new orders for those that had a kline. A failing asset is
    /// reported and does not stop the others.
    pub fn process(&mut self, as_of_time: i64) -> TickReport {
        self.current_as_of_time = Some(as_of_time);
        let mut report = TickReport {
            as_of_time,
            ..TickReport::default()
        };

        for (name, asset) in self.assets.iter_mut() {
            match asset.update(as_of_time) {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped.push(name.clone());
                    continue;
                }
                Err(e) => {
                    tracing::error!("Processing {} at {} failed: {}", name, as_of_time, e);
                    report.failed.push((name.clone(), e.to_string()));
                    continue;
                }
            }

            report.fills.extend(asset.check_orders());
            report.orders_placed += asset.place_new_orders();
            report.updated.push(name.clone());
        }

        report
    }
}

fn sync_asset(
    asset: &mut Asset,
    exchange: &dyn ExchangePort,
    interval: KlineInterval,
) -> Result<AppendStats, PeakTrailError> {
    let last_close_time = asset.store().get_last_close_time()?;
    tracing::info!(
        "Updating historical klines for {}; last close time was {:?}",
        asset.symbol(),
        last_close_time
    );
    let start_ms = last_close_time.unwrap_or(0);
    let rows = exchange.get_historical_klines(asset.symbol(), interval, start_ms)?;
    asset.store_mut().append_incremental(&rows)
}
