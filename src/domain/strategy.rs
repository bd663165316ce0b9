//! Peak-tracking strategy parameters and the pluggable follow-up policies.
//!
//! Two decisions are left open by the base strategy: what to do once a limit
//! sell has filled, and what to do when the price has moved outside every open
//! order's protected range. Both are traits with a do-nothing default.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use std::str::FromStr;

use super::kline::KlineRecord;
use super::order::{Order, OrderType};

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    /// Fraction of the tracked peak at which buys are placed.
    pub buy_margin: Decimal,
    /// Sell target as a multiple of the filled buy price.
    pub desired_sell_pct: Decimal,
    /// Half-width of every order's protected range, as a fraction of its limit price.
    pub protected_band: Decimal,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            buy_margin: dec!(0.9),
            desired_sell_pct: dec!(1.1),
            protected_band: dec!(0.01),
        }
    }
}

impl StrategyParams {
    /// Gain above the buy price targeted by the follow-up sell (0.1 for 10%).
    pub fn sell_margin(&self) -> Decimal {
        self.desired_sell_pct - Decimal::ONE
    }

    pub fn buy_price(&self, peak: Decimal) -> Decimal {
        peak * self.buy_margin
    }

    pub fn sell_price(&self, filled_buy: Decimal) -> Decimal {
        filled_buy * (Decimal::ONE + self.sell_margin())
    }
}

/// What happens to a limit sell whose price was reached.
#[derive(Debug, Clone, PartialEq)]
pub enum SellFillAction {
    KeepOpen,
    Close,
    CloseAndBuy { limit_price: Decimal },
}

pub trait SellFillPolicy {
    fn on_sell_filled(
        &self,
        order: &Order,
        kline: &KlineRecord,
        tracked_peak: Decimal,
        params: &StrategyParams,
    ) -> SellFillAction;
}

/// Leaves the filled sell in place and places nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldOnSellFill;

impl SellFillPolicy for HoldOnSellFill {
    fn on_sell_filled(
        &self,
        _order: &Order,
        _kline: &KlineRecord,
        _tracked_peak: Decimal,
        _params: &StrategyParams,
    ) -> SellFillAction {
        SellFillAction::KeepOpen
    }
}

/// Drops the filled sell.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseOnSellFill;

impl SellFillPolicy for CloseOnSellFill {
    fn on_sell_filled(
        &self,
        _order: &Order,
        _kline: &KlineRecord,
        _tracked_peak: Decimal,
        _params: &StrategyParams,
    ) -> SellFillAction {
        SellFillAction::Close
    }
}

/// Drops the filled sell and re-enters with a buy below the tracked peak.
#[derive(Debug, Clone, Copy, Default)]
pub struct RebuyOnSellFill;

impl SellFillPolicy for RebuyOnSellFill {
    fn on_sell_filled(
        &self,
        _order: &Order,
        _kline: &KlineRecord,
        tracked_peak: Decimal,
        params: &StrategyParams,
    ) -> SellFillAction {
        SellFillAction::CloseAndBuy {
            limit_price: params.buy_price(tracked_peak),
        }
    }
}

/// Order changes requested when the price is outside every protected range.
/// `cancel` holds indices into the open order list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPlan {
    pub cancel: Vec<usize>,
    pub place: Vec<(OrderType, Decimal)>,
}

impl OrderPlan {
    pub fn is_empty(&self) -> bool {
        self.cancel.is_empty() && self.place.is_empty()
    }
}

pub trait BandExitPolicy {
    fn on_band_exit(
        &self,
        current: Decimal,
        tracked_peak: Decimal,
        orders: &[Order],
        params: &StrategyParams,
    ) -> OrderPlan;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HoldOnBandExit;

impl BandExitPolicy for HoldOnBandExit {
    fn on_band_exit(
        &self,
        _current: Decimal,
        _tracked_peak: Decimal,
        _orders: &[Order],
        _params: &StrategyParams,
    ) -> OrderPlan {
        OrderPlan::default()
    }
}

/// Moves the buy up behind a rising peak: cancels open buys below the new
/// target and places one buy at `peak × buy_margin`. Sells are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailPeakOnBandExit;

impl BandExitPolicy for TrailPeakOnBandExit {
    fn on_band_exit(
        &self,
        _current: Decimal,
        tracked_peak: Decimal,
        orders: &[Order],
        params: &StrategyParams,
    ) -> OrderPlan {
        let target = params.buy_price(tracked_peak);
        let stale: Vec<usize> = orders
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_buy() && o.limit_price < target)
            .map(|(i, _)| i)
            .collect();
        let has_buy = orders.iter().any(|o| o.is_buy());

        if stale.is_empty() && has_buy {
            return OrderPlan::default();
        }
        OrderPlan {
            cancel: stale,
            place: vec![(OrderType::LimitBuy, target)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SellFillPolicyKind {
    #[default]
    Hold,
    Close,
    Rebuy,
}

impl SellFillPolicyKind {
    pub fn build(self) -> Box<dyn SellFillPolicy> {
        match self {
            SellFillPolicyKind::Hold => Box::new(HoldOnSellFill),
            SellFillPolicyKind::Close => Box::new(CloseOnSellFill),
            SellFillPolicyKind::Rebuy => Box::new(RebuyOnSellFill),
        }
    }
}

impl FromStr for SellFillPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hold" => Ok(SellFillPolicyKind::Hold),
            "close" => Ok(SellFillPolicyKind::Close),
            "rebuy" => Ok(SellFillPolicyKind::Rebuy),
            other => Err(format!(
                "unknown sell fill policy {:?} (expected hold, close or rebuy)",
                other
            )),
        }
    }
}

impl fmt::Display for SellFillPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellFillPolicyKind::Hold => f.write_str("hold"),
            SellFillPolicyKind::Close => f.write_str("close"),
            SellFillPolicyKind::Rebuy => f.write_str("rebuy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandExitPolicyKind {
    #[default]
    Hold,
    Trail,
}

impl BandExitPolicyKind {
    pub fn build(self) -> Box<dyn BandExitPolicy> {
        match self {
            BandExitPolicyKind::Hold => Box::new(HoldOnBandExit),
            BandExitPolicyKind::Trail => Box::new(TrailPeakOnBandExit),
        }
    }
}

impl FromStr for BandExitPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hold" => Ok(BandExitPolicyKind::Hold),
            "trail" => Ok(BandExitPolicyKind::Trail),
            other => Err(format!(
                "unknown band exit policy {:?} (expected hold or trail)",
                other
            )),
        }
    }
}

impl fmt::Display for BandExitPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandExitPolicyKind::Hold => f.write_str("hold"),
            BandExitPolicyKind::Trail => f.write_str("trail"),
        }
    }
}

/// Everything an `Asset` needs to run the strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyConfig {
    pub params: StrategyParams,
    pub sell_fill_policy: SellFillPolicyKind,
    pub band_exit_policy: BandExitPolicyKind,
}
