//! Account balances and 24 hour ticker snapshots.

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Account {
    pub balances: Vec<Balance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    pub symbol: String,
    pub price_change_percent: Decimal,
    pub last_price: Decimal,
    pub count: u64,
}

/// Trading symbol for `asset` quoted in `quote`, e.g. `DOGE` + `USD` → `DOGEUSD`.
pub fn asset_symbol(asset: &str, quote: &str) -> String {
    format!("{}{}", asset, quote)
}

/// Strip the quote suffix from a symbol; `None` for symbols quoted in anything else.
pub fn symbol_to_asset<'a>(symbol: &'a str, quote: &str) -> Option<&'a str> {
    symbol
        .strip_suffix(quote)
        .filter(|asset| !asset.is_empty())
}
