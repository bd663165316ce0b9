//! Kline (candle) record, raw row parsing and partition keys.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::error::PeakTrailError;

/// Column names of a partition file, in positional order of a raw row.
pub const KLINE_HEADERS: [&str; 12] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_asset_volume",
    "number_of_trades",
    "taker_buy_base_asset_volume",
    "taker_buy_quote_asset_volume",
    "ignored_field",
];

/// One kline as delivered by an exchange: twelve positional text fields.
pub type RawKlineRow = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineRecord {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
    pub quote_asset_volume: Decimal,
    pub number_of_trades: u64,
    pub taker_buy_base_asset_volume: Decimal,
    pub taker_buy_quote_asset_volume: Decimal,
    pub ignored_field: String,
}

impl KlineRecord {
    /// Parse twelve positional fields, checking `open_time <= close_time`.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = fields.into_iter().collect();
        if fields.len() != KLINE_HEADERS.len() {
            return Err(format!(
                "expected {} fields, got {}",
                KLINE_HEADERS.len(),
                fields.len()
            ));
        }

        let record = KlineRecord {
            open_time: parse_int(fields[0], KLINE_HEADERS[0])?,
            open: parse_decimal(fields[1], KLINE_HEADERS[1])?,
            high: parse_decimal(fields[2], KLINE_HEADERS[2])?,
            low: parse_decimal(fields[3], KLINE_HEADERS[3])?,
            close: parse_decimal(fields[4], KLINE_HEADERS[4])?,
            volume: parse_decimal(fields[5], KLINE_HEADERS[5])?,
            close_time: parse_int(fields[6], KLINE_HEADERS[6])?,
            quote_asset_volume: parse_decimal(fields[7], KLINE_HEADERS[7])?,
            number_of_trades: parse_int(fields[8], KLINE_HEADERS[8])?,
            taker_buy_base_asset_volume: parse_decimal(fields[9], KLINE_HEADERS[9])?,
            taker_buy_quote_asset_volume: parse_decimal(fields[10], KLINE_HEADERS[10])?,
            ignored_field: fields[11].to_string(),
        };

        if record.open_time > record.close_time {
            return Err(format!(
                "open_time {} is after close_time {}",
                record.open_time, record.close_time
            ));
        }
        Ok(record)
    }

    /// Parse a raw exchange row.
    pub fn from_raw(row: &[String]) -> Result<Self, PeakTrailError> {
        Self::from_fields(row.iter().map(String::as_str))
            .map_err(|reason| PeakTrailError::MalformedRow { reason })
    }

    /// Fields in header order, as written to a partition file.
    pub fn to_fields(&self) -> [String; 12] {
        [
            self.open_time.to_string(),
            self.open.to_string(),
            self.high.to_string(),
            self.low.to_string(),
            self.close.to_string(),
            self.volume.to_string(),
            self.close_time.to_string(),
            self.quote_asset_volume.to_string(),
            self.number_of_trades.to_string(),
            self.taker_buy_base_asset_volume.to_string(),
            self.taker_buy_quote_asset_volume.to_string(),
            self.ignored_field.clone(),
        ]
    }

    pub fn covers(&self, timestamp: i64) -> bool {
        self.open_time <= timestamp && timestamp <= self.close_time
    }

    pub fn partition_key(&self) -> Result<NaiveDate, PeakTrailError> {
        partition_key(self.open_time)
    }
}

fn parse_int<T: FromStr>(value: &str, field: &str) -> Result<T, String>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("invalid {} value {:?}: {}", field, value, e))
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim())
        .map_err(|e| format!("invalid {} value {:?}: {}", field, value, e))
}

/// UTC calendar day of a millisecond timestamp.
pub fn partition_key(timestamp_ms: i64) -> Result<NaiveDate, PeakTrailError> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.date_naive())
        .ok_or(PeakTrailError::InvalidTimestamp {
            timestamp: timestamp_ms,
        })
}

/// Millisecond timestamp of 00:00 UTC on `date`.
pub fn day_start_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineInterval {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    EightHours,
    TwelveHours,
    OneDay,
    ThreeDays,
    OneWeek,
}

impl KlineInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            KlineInterval::OneMinute => "1m",
            KlineInterval::ThreeMinutes => "3m",
            KlineInterval::FiveMinutes => "5m",
            KlineInterval::FifteenMinutes => "15m",
            KlineInterval::ThirtyMinutes => "30m",
            KlineInterval::OneHour => "1h",
            KlineInterval::TwoHours => "2h",
            KlineInterval::FourHours => "4h",
            KlineInterval::SixHours => "6h",
            KlineInterval::EightHours => "8h",
            KlineInterval::TwelveHours => "12h",
            KlineInterval::OneDay => "1d",
            KlineInterval::ThreeDays => "3d",
            KlineInterval::OneWeek => "1w",
        }
    }

    pub fn duration_ms(&self) -> i64 {
        const MINUTE: i64 = 60_000;
        const HOUR: i64 = 60 * MINUTE;
        const DAY: i64 = 24 * HOUR;
        match self {
            KlineInterval::OneMinute => MINUTE,
            KlineInterval::ThreeMinutes => 3 * MINUTE,
            KlineInterval::FiveMinutes => 5 * MINUTE,
            KlineInterval::FifteenMinutes => 15 * MINUTE,
            KlineInterval::ThirtyMinutes => 30 * MINUTE,
            KlineInterval::OneHour => HOUR,
            KlineInterval::TwoHours => 2 * HOUR,
            KlineInterval::FourHours => 4 * HOUR,
            KlineInterval::SixHours => 6 * HOUR,
            KlineInterval::EightHours => 8 * HOUR,
            KlineInterval::TwelveHours => 12 * HOUR,
            KlineInterval::OneDay => DAY,
            KlineInterval::ThreeDays => 3 * DAY,
            KlineInterval::OneWeek => 7 * DAY,
        }
    }
}

impl FromStr for KlineInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let interval = match s.trim() {
            "1m" => KlineInterval::OneMinute,
            "3m" => KlineInterval::ThreeMinutes,
            "5m" => KlineInterval::FiveMinutes,
            "15m" => KlineInterval::FifteenMinutes,
            "30m" => KlineInterval::ThirtyMinutes,
            "1h" => KlineInterval::OneHour,
            "2h" => KlineInterval::TwoHours,
            "4h" => KlineInterval::FourHours,
            "6h" => KlineInterval::SixHours,
            "8h" => KlineInterval::EightHours,
            "12h" => KlineInterval::TwelveHours,
            "1d" => KlineInterval::OneDay,
            "3d" => KlineInterval::ThreeDays,
            "1w" => KlineInterval::OneWeek,
            other => return Err(format!("unknown kline interval {:?}", other)),
        };
        Ok(interval)
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
