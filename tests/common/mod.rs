#![allow(dead_code)]

use chrono::NaiveDate;
use peaktrail::domain::account::{Account, Balance, Ticker};
use peaktrail::domain::error::PeakTrailError;
use peaktrail::domain::kline::{day_start_millis, KlineInterval, RawKlineRow};
use peaktrail::ports::exchange_port::ExchangePort;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub const FIFTEEN_MIN_MS: i64 = 900_000;
pub const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 86_400_000;

pub struct MockExchange {
    pub balances: Vec<Balance>,
    pub klines: HashMap<String, Vec<RawKlineRow>>,
    pub tickers: Vec<Ticker>,
    pub errors: HashMap<String, String>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            balances: vec![balance("USD", Decimal::new(1000, 0))],
            klines: HashMap::new(),
            tickers: Vec::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_asset(mut self, asset: &str) -> Self {
        self.balances.push(balance(asset, Decimal::ZERO));
        self
    }

    pub fn with_klines(mut self, symbol: &str, rows: Vec<RawKlineRow>) -> Self {
        self.klines.insert(symbol.to_string(), rows);
        self
    }

    pub fn with_ticker(mut self, ticker: Ticker) -> Self {
        self.tickers.push(ticker);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl ExchangePort for MockExchange {
    fn get_account(&self) -> Result<Account, PeakTrailError> {
        Ok(Account {
            balances: self.balances.clone(),
        })
    }

    fn get_historical_klines(
        &self,
        symbol: &str,
        _interval: KlineInterval,
        start_ms: i64,
    ) -> Result<Vec<RawKlineRow>, PeakTrailError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(PeakTrailError::Exchange {
                reason: reason.clone(),
            });
        }
        Ok(self
            .klines
            .get(symbol)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r[0].parse::<i64>().unwrap() >= start_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_ticker(&self) -> Result<Vec<Ticker>, PeakTrailError> {
        Ok(self.tickers.clone())
    }
}

pub fn balance(asset: &str, free: Decimal) -> Balance {
    Balance {
        asset: asset.to_string(),
        free,
        locked: Decimal::ZERO,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day_start(y: i32, m: u32, d: u32) -> i64 {
    day_start_millis(date(y, m, d))
}

/// A kline row shaped like an exchange response.
pub fn kline_row(open_time: i64, width_ms: i64, low: &str, high: &str, close: &str) -> RawKlineRow {
    vec![
        open_time.to_string(),
        close.to_string(),
        high.to_string(),
        low.to_string(),
        close.to_string(),
        "3426026.00000000".to_string(),
        (open_time + width_ms - 1).to_string(),
        "177002.30790000".to_string(),
        "221".to_string(),
        "904724.00000000".to_string(),
        "46841.83200000".to_string(),
        "0".to_string(),
    ]
}

/// Contiguous rows at a flat price.
pub fn flat_rows(start: i64, width_ms: i64, count: i64, price: &str) -> Vec<RawKlineRow> {
    (0..count)
        .map(|i| kline_row(start + i * width_ms, width_ms, price, price, price))
        .collect()
}
