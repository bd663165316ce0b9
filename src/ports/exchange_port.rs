//! Exchange access port trait.

use crate::domain::account::{Account, Ticker};
use crate::domain::error::PeakTrailError;
use crate::domain::kline::{KlineInterval, RawKlineRow};

pub trait ExchangePort {
    fn get_account(&self) -> Result<Account, PeakTrailError>;

    /// Klines for `symbol` opening at or after `start_ms`, ascending.
    fn get_historical_klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        start_ms: i64,
    ) -> Result<Vec<RawKlineRow>, PeakTrailError>;

    /// 24 hour ticker snapshots for every symbol.
    fn get_ticker(&self) -> Result<Vec<Ticker>, PeakTrailError>;
}
