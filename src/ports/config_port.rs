//! Configuration access port trait.

use rust_decimal::Decimal;
use std::str::FromStr;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Exact decimal value. `None` when missing, `Some(Err)` when unparseable.
    fn get_decimal(&self, section: &str, key: &str) -> Option<Result<Decimal, String>> {
        self.get_string(section, key).map(|raw| {
            Decimal::from_str(raw.trim()).map_err(|e| format!("{:?} is not a decimal: {}", raw, e))
        })
    }
}
