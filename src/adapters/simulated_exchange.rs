//! Offline exchange used for simulations.
//!
//! The account holds the starting cash in the quote asset plus an empty balance
//! for every configured asset. Klines come from headerless twelve-column CSV
//! dumps, one `{SYMBOL}.csv` per symbol.

use crate::domain::account::{asset_symbol, Account, Balance, Ticker};
use crate::domain::error::PeakTrailError;
use crate::domain::kline::{KlineInterval, RawKlineRow};
use crate::ports::exchange_port::ExchangePort;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct SimulatedExchange {
    quote_asset: String,
    starting_cash: Decimal,
    assets: Vec<String>,
    klines: HashMap<String, Vec<RawKlineRow>>,
}

impl SimulatedExchange {
    pub fn new(quote_asset: &str, starting_cash: Decimal, assets: Vec<String>) -> Self {
        SimulatedExchange {
            quote_asset: quote_asset.to_string(),
            starting_cash,
            assets,
            klines: HashMap::new(),
        }
    }

    pub fn with_klines(mut self, symbol: &str, rows: Vec<RawKlineRow>) -> Self {
        self.klines.insert(symbol.to_string(), rows);
        self
    }

    /// Load `{dir}/{SYMBOL}.csv` for every configured asset that has one.
    pub fn load_dump_dir(mut self, dir: &Path) -> Result<Self, PeakTrailError> {
        for asset in &self.assets {
            let symbol = asset_symbol(asset, &self.quote_asset);
            let path = dir.join(format!("{}.csv", symbol));
            if !path.is_file() {
                tracing::warn!("No kline dump for {} at {}", symbol, path.display());
                continue;
            }
            let rows = read_dump(&path)?;
            tracing::debug!("Loaded {} dump rows for {}", rows.len(), symbol);
            self.klines.insert(symbol, rows);
        }
        Ok(self)
    }
}

fn read_dump(path: &Path) -> Result<Vec<RawKlineRow>, PeakTrailError> {
    let content = fs::read_to_string(path).map_err(|e| PeakTrailError::Exchange {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| PeakTrailError::Exchange {
            reason: format!("CSV parse error in {}: {}", path.display(), e),
        })?;
        rows.push(record.iter().map(|f| f.trim().to_string()).collect());
    }
    Ok(rows)
}

impl ExchangePort for SimulatedExchange {
    fn get_account(&self) -> Result<Account, PeakTrailError> {
        let mut balances = vec![Balance {
            asset: self.quote_asset.clone(),
            free: self.starting_cash,
            locked: Decimal::ZERO,
        }];
        balances.extend(self.assets.iter().map(|asset| Balance {
            asset: asset.clone(),
            free: Decimal::ZERO,
            locked: Decimal::ZERO,
        }));
        Ok(Account { balances })
    }

    fn get_historical_klines(
        &self,
        symbol: &str,
        _interval: KlineInterval,
        start_ms: i64,
    ) -> Result<Vec<RawKlineRow>, PeakTrailError> {
        let Some(rows) = self.klines.get(symbol) else {
            return Ok(Vec::new());
        };
        // rows whose open_time does not parse are passed on for the store to reject
        Ok(rows
            .iter()
            .filter(|row| {
                row.first()
                    .and_then(|t| t.parse::<i64>().ok())
                    .is_none_or(|open_time| open_time >= start_ms)
            })
            .cloned()
            .collect())
    }

    fn get_ticker(&self) -> Result<Vec<Ticker>, PeakTrailError> {
        Ok(Vec::new())
    }
}
