//! Offline replay: step the assets through stored history one interval at a time.

use chrono::NaiveDate;

use super::assets::Assets;
use super::kline::{day_start_millis, KlineInterval};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub interval: KlineInterval,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationSummary {
    pub ticks: usize,
    pub asset_updates: usize,
    pub fills: usize,
    pub orders_placed: usize,
    pub failures: usize,
}

/// Process every tick from `start_date` 00:00 UTC up to, not including,
/// `end_date` 00:00 UTC.
pub fn run_simulation(assets: &mut Assets, config: &SimulationConfig) -> SimulationSummary {
    let start = day_start_millis(config.start_date);
    let end = day_start_millis(config.end_date);
    let step = config.interval.duration_ms();

    let mut summary = SimulationSummary::default();
    let mut current = start;
    while current < end {
        let report = assets.process(current);
        summary.ticks += 1;
        summary.asset_updates += report.updated.len();
        summary.fills += report.fills.len();
        summary.orders_placed += report.orders_placed;
        summary.failures += report.failed.len();
        tracing::debug!("current position {}", current);
        current += step;
    }

    tracing::info!(
        "Simulated {} ticks: {} asset updates, {} fills, {} orders placed, {} failures",
        summary.ticks,
        summary.asset_updates,
        summary.fills,
        summary.orders_placed,
        summary.failures
    );
    summary
}
