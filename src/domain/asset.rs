//! Per-asset peak tracking and order management.
//!
//! The tracked peak starts unset and is initialised from the first observed
//! close; afterwards it only ever rises. With no open orders a limit buy is
//! placed `buy_margin` below the peak. A filled buy becomes a limit sell
//! `sell_margin` above the buy price.

use rust_decimal::Decimal;

use super::account::{asset_symbol, Balance, Ticker};
use super::error::PeakTrailError;
use super::kline::KlineRecord;
use super::kline_store::KlineStore;
use super::order::{Order, OrderType};
use super::strategy::{
    BandExitPolicy, HoldOnBandExit, HoldOnSellFill, SellFillAction, SellFillPolicy,
    StrategyConfig, StrategyParams,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    NoPeak,
    Tracking,
}

/// A limit order whose price was reached by an observed kline.
#[derive(Debug, Clone, PartialEq)]
pub struct FillEvent {
    pub asset: String,
    pub order_type: OrderType,
    pub limit_price: Decimal,
    pub kline_open_time: i64,
}

pub struct Asset {
    name: String,
    symbol: String,
    pub free: Decimal,
    pub locked: Decimal,
    orders: Vec<Order>,
    tracked_peak: Option<Decimal>,
    recent_kline: Option<KlineRecord>,
    recent_ticker: Option<Ticker>,
    store: KlineStore,
    params: StrategyParams,
    sell_fill_policy: Box<dyn SellFillPolicy>,
    band_exit_policy: Box<dyn BandExitPolicy>,
}

impl Asset {
    pub fn new(
        balance: &Balance,
        quote_asset: &str,
        store: KlineStore,
        params: StrategyParams,
    ) -> Self {
        Asset {
            name: balance.asset.clone(),
            symbol: asset_symbol(&balance.asset, quote_asset),
            free: balance.free,
            locked: balance.locked,
            orders: Vec::new(),
            tracked_peak: None,
            recent_kline: None,
            recent_ticker: None,
            store,
            params,
            sell_fill_policy: Box::new(HoldOnSellFill),
            band_exit_policy: Box::new(HoldOnBandExit),
        }
    }

    pub fn from_config(
        balance: &Balance,
        quote_asset: &str,
        store: KlineStore,
        config: &StrategyConfig,
    ) -> Self {
        Asset::new(balance, quote_asset, store, config.params.clone())
            .with_sell_fill_policy(config.sell_fill_policy.build())
            .with_band_exit_policy(config.band_exit_policy.build())
    }

    pub fn with_sell_fill_policy(mut self, policy: Box<dyn SellFillPolicy>) -> Self {
        self.sell_fill_policy = policy;
        self
    }

    pub fn with_band_exit_policy(mut self, policy: Box<dyn BandExitPolicy>) -> Self {
        self.band_exit_policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn orders_mut(&mut self) -> &mut [Order] {
        &mut self.orders
    }

    pub fn tracked_peak(&self) -> Option<Decimal> {
        self.tracked_peak
    }

    pub fn recent_kline(&self) -> Option<&KlineRecord> {
        self.recent_kline.as_ref()
    }

    pub fn recent_ticker(&self) -> Option<&Ticker> {
        self.recent_ticker.as_ref()
    }

    pub fn store(&self) -> &KlineStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut KlineStore {
        &mut self.store
    }

    pub fn state(&self) -> TrackingState {
        match self.tracked_peak {
            Some(_) => TrackingState::Tracking,
            None => TrackingState::NoPeak,
        }
    }

    /// Load the kline covering `timestamp`. `Ok(false)` means no kline is
    /// stored for that time and the asset should sit this tick out.
    pub fn update(&mut self, timestamp: i64) -> Result<bool, PeakTrailError> {
        match self.store.get_at(timestamp) {
            Ok(kline) => {
                self.observe(kline);
                Ok(true)
            }
            Err(e) if e.is_missing_data() => {
                tracing::debug!("No kline for {} at {}: {}", self.name, timestamp, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Start from the earliest stored kline.
    pub fn update_from_first_kline(&mut self) -> Result<(), PeakTrailError> {
        let kline = self.store.get_first()?;
        self.observe(kline);
        Ok(())
    }

    pub fn observe(&mut self, kline: KlineRecord) {
        self.recent_kline = Some(kline);
    }

    pub fn update_24_hour_ticker(&mut self, ticker: Ticker) {
        self.recent_ticker = Some(ticker);
    }

    fn current_price(&self) -> Option<Decimal> {
        self.recent_kline.as_ref().map(|k| k.close)
    }

    /// Raise the peak to the current close and return the first open order
    /// whose protected range holds that close.
    pub fn get_order_for_range(&mut self) -> Option<&Order> {
        let current = self.current_price()?;
        match self.tracked_peak {
            Some(peak) if current <= peak => {}
            _ => {
                tracing::debug!("{} peak raised to {}", self.name, current);
                self.tracked_peak = Some(current);
            }
        }
        self.orders.iter().find(|o| o.protects(current))
    }

    /// Apply fills implied by the most recent kline's low and high.
    pub fn check_orders(&mut self) -> Vec<FillEvent> {
        let Some(kline) = self.recent_kline.clone() else {
            return Vec::new();
        };
        let peak = *self.tracked_peak.get_or_insert(kline.close);

        let mut fills = Vec::new();
        let mut removals = Vec::new();
        let mut additions = Vec::new();

        for (idx, order) in self.orders.iter().enumerate() {
            match order.order_type {
                OrderType::LimitBuy if kline.low < order.limit_price => {
                    fills.push(self.fill_event(order, &kline));
                    removals.push(idx);
                    additions.push((
                        OrderType::LimitSell,
                        self.params.sell_price(order.limit_price),
                    ));
                }
                OrderType::LimitSell if kline.high > order.limit_price => {
                    fills.push(self.fill_event(order, &kline));
                    match self
                        .sell_fill_policy
                        .on_sell_filled(order, &kline, peak, &self.params)
                    {
                        SellFillAction::KeepOpen => {}
                        SellFillAction::Close => removals.push(idx),
                        SellFillAction::CloseAndBuy { limit_price } => {
                            removals.push(idx);
                            additions.push((OrderType::LimitBuy, limit_price));
                        }
                    }
                }
                _ => {}
            }
        }

        for fill in &fills {
            tracing::info!(
                "{} {} filled at {} (kline {})",
                fill.asset,
                fill.order_type,
                fill.limit_price,
                fill.kline_open_time
            );
        }
        self.apply(&removals, additions);
        fills
    }

    /// Place a buy below the peak when nothing is open; otherwise defer to the
    /// band exit policy once the price has left every protected range.
    /// Returns the number of orders placed.
    pub fn place_new_orders(&mut self) -> usize {
        if self.orders.is_empty() {
            let Some(peak) = self.tracked_peak else {
                return 0;
            };
            self.place_limit_buy(self.params.buy_price(peak));
            return 1;
        }

        if self.get_order_for_range().is_some() {
            return 0;
        }
        let (Some(current), Some(peak)) = (self.current_price(), self.tracked_peak) else {
            return 0;
        };
        let plan = self
            .band_exit_policy
            .on_band_exit(current, peak, &self.orders, &self.params);
        let placed = plan.place.len();
        self.apply(&plan.cancel, plan.place);
        placed
    }

    pub fn place_limit_buy(&mut self, limit_price: Decimal) -> &Order {
        self.place(OrderType::LimitBuy, limit_price)
    }

    pub fn place_limit_sell(&mut self, limit_price: Decimal) -> &Order {
        self.place(OrderType::LimitSell, limit_price)
    }

    fn place(&mut self, order_type: OrderType, limit_price: Decimal) -> &Order {
        tracing::debug!("{} placing {} at {}", self.name, order_type, limit_price);
        let idx = self.orders.len();
        self.orders.push(Order::new(
            &self.name,
            limit_price,
            order_type,
            self.params.protected_band,
        ));
        &self.orders[idx]
    }

    /// Remove the orders at `removals`, then place `additions` in order.
    fn apply(&mut self, removals: &[usize], additions: Vec<(OrderType, Decimal)>) {
        if !removals.is_empty() {
            let mut idx = 0;
            self.orders.retain(|_| {
                let keep = !removals.contains(&idx);
                idx += 1;
                keep
            });
        }
        for (order_type, limit_price) in additions {
            self.place(order_type, limit_price);
        }
    }

    fn fill_event(&self, order: &Order, kline: &KlineRecord) -> FillEvent {
        FillEvent {
            asset: self.name.clone(),
            order_type: order.order_type,
            limit_price: order.limit_price,
            kline_open_time: kline.open_time,
        }
    }
}
