//! Limit orders and their protected price range.

use rust_decimal::Decimal;
use std::fmt;

use super::error::PeakTrailError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    LimitBuy,
    LimitSell,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::LimitBuy => f.write_str("limit_buy"),
            OrderType::LimitSell => f.write_str("limit_sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub asset: String,
    pub order_id: Option<String>,
    pub limit_price: Decimal,
    pub order_type: OrderType,
    /// Fractional half-width of the protected range, e.g. 0.01 for ±1%.
    pub band_width: Decimal,
}

impl Order {
    pub fn new(
        asset: &str,
        limit_price: Decimal,
        order_type: OrderType,
        band_width: Decimal,
    ) -> Self {
        Order {
            asset: asset.to_string(),
            order_id: None,
            limit_price,
            order_type,
            band_width,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.order_type == OrderType::LimitBuy
    }

    pub fn is_sell(&self) -> bool {
        self.order_type == OrderType::LimitSell
    }

    /// `[bottom, top]` around the limit price within which no action is needed.
    pub fn protected_range(&self) -> (Decimal, Decimal) {
        let bottom = self.limit_price * (Decimal::ONE - self.band_width);
        let top = self.limit_price * (Decimal::ONE + self.band_width);
        (bottom, top)
    }

    pub fn protects(&self, price: Decimal) -> bool {
        let (bottom, top) = self.protected_range();
        bottom <= price && price <= top
    }

    /// Record the exchange-assigned id. An id is assigned at most once.
    pub fn acknowledge(&mut self, order_id: &str) -> Result<(), PeakTrailError> {
        if let Some(existing) = &self.order_id {
            return Err(PeakTrailError::OrderAlreadyAcknowledged {
                order_id: existing.clone(),
            });
        }
        self.order_id = Some(order_id.to_string());
        Ok(())
    }
}
