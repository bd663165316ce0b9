//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::local_storage::LocalDiskStorage;
use crate::adapters::simulated_exchange::SimulatedExchange;
use crate::domain::assets::Assets;
use crate::domain::config_validation::{
    parse_date, quote_asset, read_decimal, validate_exchange_config, validate_simulation_config,
    validate_strategy_config,
};
use crate::domain::error::PeakTrailError;
use crate::domain::kline::KlineInterval;
use crate::domain::kline_store::KlineStore;
use crate::domain::simulation::{run_simulation, SimulationConfig, SimulationSummary};
use crate::domain::strategy::{
    BandExitPolicyKind, SellFillPolicyKind, StrategyConfig, StrategyParams,
};
use crate::domain::universe::parse_assets;
use crate::ports::config_port::ConfigPort;
use crate::ports::exchange_port::ExchangePort;
use crate::ports::storage_port::PartitionStorage;

pub const DEFAULT_KLINE_PATH: &str = "historical_kline";

/// Starting cash when `[exchange] starting_cash` is absent.
pub fn default_starting_cash() -> Decimal {
    dec!(1000)
}

#[derive(Parser, Debug)]
#[command(name = "peaktrail", about = "Kline history store and peak-tracking order simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Append new klines for every configured asset to local storage
    Sync {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Sync history, then replay it through the order strategy
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored kline range for one asset
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        asset: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Sync { config } => run_sync(&config),
        Command::Simulate { config } => run_simulate(&config),
        Command::Info { config, asset } => run_info(&config, &asset),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PeakTrailError> {
    FileConfigAdapter::from_file(path).map_err(|e| PeakTrailError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn kline_path(config: &dyn ConfigPort) -> PathBuf {
    config
        .get_string("storage", "kline_path")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_KLINE_PATH.to_string())
        .into()
}

pub fn build_interval(config: &dyn ConfigPort) -> Result<KlineInterval, PeakTrailError> {
    match config.get_string("exchange", "interval") {
        None => Ok(KlineInterval::FifteenMinutes),
        Some(s) => s.parse().map_err(|reason| PeakTrailError::ConfigInvalid {
            section: "exchange".into(),
            key: "interval".into(),
            reason,
        }),
    }
}

pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, PeakTrailError> {
    validate_strategy_config(config)?;

    let defaults = StrategyParams::default();
    let params = StrategyParams {
        buy_margin: read_decimal(config, "strategy", "buy_margin")?.unwrap_or(defaults.buy_margin),
        desired_sell_pct: read_decimal(config, "strategy", "desired_sell_pct")?
            .unwrap_or(defaults.desired_sell_pct),
        protected_band: read_decimal(config, "strategy", "protected_band")?
            .unwrap_or(defaults.protected_band),
    };

    let sell_fill_policy: SellFillPolicyKind =
        parse_or_default(config, "strategy", "sell_fill_policy")?;
    let band_exit_policy: BandExitPolicyKind =
        parse_or_default(config, "strategy", "band_exit_policy")?;

    Ok(StrategyConfig {
        params,
        sell_fill_policy,
        band_exit_policy,
    })
}

fn parse_or_default<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<T, PeakTrailError>
where
    T: FromStr<Err = String> + Default,
{
    match config.get_string(section, key) {
        None => Ok(T::default()),
        Some(s) => s.parse().map_err(|reason| PeakTrailError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason,
        }),
    }
}

pub fn build_simulation_config(
    config: &dyn ConfigPort,
) -> Result<SimulationConfig, PeakTrailError> {
    validate_simulation_config(config)?;
    Ok(SimulationConfig {
        start_date: parse_date(config, "start_date")?,
        end_date: parse_date(config, "end_date")?,
        interval: build_interval(config)?,
    })
}

/// The offline exchange described by the `[exchange]` section.
pub fn build_exchange(config: &dyn ConfigPort) -> Result<SimulatedExchange, PeakTrailError> {
    validate_exchange_config(config)?;

    let quote = quote_asset(config);
    let starting_cash = read_decimal(config, "exchange", "starting_cash")?
        .unwrap_or_else(default_starting_cash);
    let assets_str = config.get_string("exchange", "assets").unwrap_or_default();
    let assets = parse_assets(&assets_str, &quote).map_err(|e| PeakTrailError::ConfigInvalid {
        section: "exchange".into(),
        key: "assets".into(),
        reason: e.to_string(),
    })?;

    let exchange = SimulatedExchange::new(&quote, starting_cash, assets);
    match config
        .get_string("exchange", "kline_dump_dir")
        .filter(|s| !s.trim().is_empty())
    {
        Some(dir) => exchange.load_dump_dir(Path::new(dir.trim())),
        None => Ok(exchange),
    }
}

/// One asset per non-quote balance, each stored under `base_path/{asset}`.
pub fn open_assets(
    exchange: &dyn ExchangePort,
    quote: &str,
    strategy: &StrategyConfig,
    base_path: &Path,
) -> Result<Assets, PeakTrailError> {
    Assets::from_account(exchange, quote, strategy, |name| {
        let storage = LocalDiskStorage::open(base_path, name)?;
        Ok(Box::new(storage) as Box<dyn PartitionStorage>)
    })
}

pub fn sync(config: &dyn ConfigPort, strategy: &StrategyConfig) -> Result<Assets, PeakTrailError> {
    let exchange = build_exchange(config)?;
    let interval = build_interval(config)?;
    let base_path = kline_path(config);

    let mut assets = open_assets(&exchange, &quote_asset(config), strategy, &base_path)?;
    let report = assets.sync_historical_klines(&exchange, interval);
    for (name, stats) in &report.synced {
        tracing::info!(
            "{}: received {}, skipped {}, wrote {} klines across {} partitions",
            name,
            stats.received,
            stats.skipped,
            stats.written,
            stats.partitions_opened
        );
    }
    if !report.failed.is_empty() {
        tracing::warn!("{} of {} assets failed to sync", report.failed.len(), assets.len());
    }
    assets.update_tickers(&exchange)?;
    Ok(assets)
}

fn run_sync(config_path: &Path) -> Result<(), PeakTrailError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let assets = sync(&config, &StrategyConfig::default())?;
    eprintln!(
        "Synced {} assets into {}",
        assets.len(),
        kline_path(&config).display()
    );
    Ok(())
}

fn run_simulate(config_path: &Path) -> Result<(), PeakTrailError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let strategy = build_strategy_config(&config)?;
    let sim_config = build_simulation_config(&config)?;

    let mut assets = sync(&config, &strategy)?;
    eprintln!(
        "Simulating {} to {} every {} ({} sell fill, {} band exit)",
        sim_config.start_date,
        sim_config.end_date,
        sim_config.interval,
        strategy.sell_fill_policy,
        strategy.band_exit_policy
    );
    let summary = run_simulation(&mut assets, &sim_config);
    print_summary(&summary, &assets);
    Ok(())
}

fn print_summary(summary: &SimulationSummary, assets: &Assets) {
    println!("ticks:          {}", summary.ticks);
    println!("asset updates:  {}", summary.asset_updates);
    println!("fills:          {}", summary.fills);
    println!("orders placed:  {}", summary.orders_placed);
    println!("failures:       {}", summary.failures);

    println!("\nOpen orders:");
    for asset in assets.iter() {
        let peak = asset
            .tracked_peak()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        if asset.orders().is_empty() {
            println!("  {:<8} none (peak {})", asset.name(), peak);
        }
        for order in asset.orders() {
            println!(
                "  {:<8} {:<10} @ {} (peak {})",
                asset.name(),
                order.order_type,
                order.limit_price,
                peak
            );
        }
    }
}

fn run_info(config_path: &Path, asset: &str) -> Result<(), PeakTrailError> {
    let config = load_config(config_path)?;
    let asset = asset.trim().to_uppercase();
    let Some(storage) = LocalDiskStorage::open_existing(&kline_path(&config), &asset) else {
        eprintln!("{}: no klines stored", asset);
        return Ok(());
    };
    let store = KlineStore::new(&asset, Box::new(storage));

    let first = match store.get_first() {
        Ok(record) => record,
        Err(PeakTrailError::EmptyStore { .. }) => {
            eprintln!("{}: no klines stored", asset);
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    let last = store.get_last()?;
    let partitions = store.partitions()?;

    println!(
        "{}: {} partitions, first open {}, last open {}, last close {}",
        asset,
        partitions.len(),
        format_millis(first.open_time),
        format_millis(last.open_time),
        format_millis(last.close_time)
    );
    Ok(())
}

fn format_millis(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => format!("{} ({})", dt.format("%Y-%m-%d %H:%M:%S"), ms),
        None => ms.to_string(),
    }
}
