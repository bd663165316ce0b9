//! Integration tests for the kline store and the order strategy.
//!
//! Tests cover:
//! - Kline store on local disk: partition files, reopen, day rollover
//! - Lookup and idempotency properties (proptest)
//! - Strategy scenarios: first buy, buy fill, peak tracking, band exit policies
//! - Sync and replay through `Assets` with a mock exchange

mod common;

use common::*;
use peaktrail::adapters::local_storage::LocalDiskStorage;
use peaktrail::adapters::memory_storage::MemoryStorage;
use peaktrail::domain::asset::Asset;
use peaktrail::domain::assets::Assets;
use peaktrail::domain::error::PeakTrailError;
use peaktrail::domain::kline::{KlineInterval, KlineRecord};
use peaktrail::domain::kline_store::KlineStore;
use peaktrail::domain::order::OrderType;
use peaktrail::domain::simulation::{run_simulation, SimulationConfig};
use peaktrail::domain::strategy::{
    BandExitPolicyKind, SellFillPolicyKind, StrategyConfig, StrategyParams,
};
use peaktrail::ports::storage_port::PartitionStorage;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs;

fn memory_store(asset: &str) -> KlineStore {
    KlineStore::new(asset, Box::new(MemoryStorage::new()))
}

fn doge(store: KlineStore, config: &StrategyConfig) -> Asset {
    Asset::from_config(&balance("DOGE", Decimal::ZERO), "USD", store, config)
}

mod local_disk_store {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partitions_are_csv_files_per_day() {
        let dir = TempDir::new().unwrap();
        let storage = LocalDiskStorage::open(dir.path(), "DOGE").unwrap();
        let mut store = KlineStore::new("DOGE", Box::new(storage));

        let start = day_start(2021, 2, 27) + DAY_MS - 2 * HOUR_MS;
        let stats = store
            .append_incremental(&flat_rows(start, HOUR_MS, 4, "0.0510"))
            .unwrap();
        assert_eq!(stats.written, 4);
        assert_eq!(stats.partitions_opened, 2);

        let first = dir.path().join("DOGE").join("2021-02-27.csv");
        let second = dir.path().join("DOGE").join("2021-02-28.csv");
        let content = fs::read_to_string(&first).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "open_time,open,high,low,close,volume,close_time,quote_asset_volume,number_of_trades,taker_buy_base_asset_volume,taker_buy_quote_asset_volume,ignored_field"
        );
        assert_eq!(lines.count(), 2);
        assert_eq!(fs::read_to_string(&second).unwrap().lines().count(), 3);
    }

    #[test]
    fn reopened_store_sees_previous_appends() {
        let dir = TempDir::new().unwrap();
        let start = day_start(2021, 2, 27);
        {
            let storage = LocalDiskStorage::open(dir.path(), "DOGE").unwrap();
            let mut store = KlineStore::new("DOGE", Box::new(storage));
            store
                .append_incremental(&flat_rows(start, FIFTEEN_MIN_MS, 3, "0.0510"))
                .unwrap();
        }

        let storage = LocalDiskStorage::open(dir.path(), "DOGE").unwrap();
        let mut store = KlineStore::new("DOGE", Box::new(storage));
        assert_eq!(
            store.get_last_close_time().unwrap(),
            Some(start + 3 * FIFTEEN_MIN_MS - 1)
        );

        let stats = store
            .append_incremental(&flat_rows(start, FIFTEEN_MIN_MS, 5, "0.0510"))
            .unwrap();
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.written, 2);

        let content = fs::read_to_string(dir.path().join("DOGE").join("2021-02-27.csv")).unwrap();
        assert_eq!(content.lines().filter(|l| l.starts_with("open_time")).count(), 1);
        assert_eq!(content.lines().count(), 6);
    }

    #[test]
    fn stored_record_is_textually_identical() {
        let dir = TempDir::new().unwrap();
        let storage = LocalDiskStorage::open(dir.path(), "DOGE").unwrap();
        let mut store = KlineStore::new("DOGE", Box::new(storage));
        let row = kline_row(day_start(2021, 2, 27), FIFTEEN_MIN_MS, "0.0509", "0.0520", "0.0515");
        store.append_incremental(&[row.clone()]).unwrap();

        let record = store.get_at(day_start(2021, 2, 27) + 1).unwrap();
        assert_eq!(record.to_fields().to_vec(), row);
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        let storage = LocalDiskStorage::open(dir.path(), "DOGE").unwrap();
        fs::write(dir.path().join("DOGE").join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("DOGE").join("latest.csv"), "x").unwrap();
        assert!(storage.list_partitions().unwrap().is_empty());

        let store = KlineStore::new("DOGE", Box::new(storage));
        assert!(matches!(store.get_first(), Err(PeakTrailError::EmptyStore { .. })));
    }
}

mod store_properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn get_at_returns_the_covering_record(
            count in 1i64..40,
            pick in 0i64..40,
            offset in 0i64..FIFTEEN_MIN_MS,
        ) {
            let start = day_start(2021, 2, 27) + 20 * HOUR_MS;
            let rows: Vec<_> = (0..count)
                .map(|i| {
                    let price = format!("0.05{:02}", i);
                    kline_row(start + i * FIFTEEN_MIN_MS, FIFTEEN_MIN_MS, &price, &price, &price)
                })
                .collect();
            let mut store = memory_store("DOGE");
            store.append_incremental(&rows).unwrap();

            let idx = pick % count;
            let record = store.get_at(start + idx * FIFTEEN_MIN_MS + offset).unwrap();
            prop_assert_eq!(record.to_fields().to_vec(), rows[idx as usize].clone());
        }

        #[test]
        fn repeated_append_changes_nothing(
            first in 1i64..30,
            overlap in 0i64..30,
            extra in 0i64..10,
        ) {
            let start = day_start(2021, 2, 27) + 22 * HOUR_MS;
            let storage = MemoryStorage::new();
            let mut store = KlineStore::new("DOGE", Box::new(storage.clone()));
            store
                .append_incremental(&flat_rows(start, FIFTEEN_MIN_MS, first, "1.5"))
                .unwrap();
            let snapshot: Vec<_> = storage
                .keys()
                .into_iter()
                .map(|k| storage.contents(k))
                .collect();
            let max_close = store.get_last_close_time().unwrap();

            // a batch that only repeats stored rows is a no-op
            let repeat_len = overlap.min(first);
            let stats = store
                .append_incremental(&flat_rows(start, FIFTEEN_MIN_MS, repeat_len, "1.5"))
                .unwrap();
            prop_assert_eq!(stats.written, 0);
            prop_assert_eq!(store.get_last_close_time().unwrap(), max_close);
            let after: Vec<_> = storage
                .keys()
                .into_iter()
                .map(|k| storage.contents(k))
                .collect();
            prop_assert_eq!(after, snapshot);

            // an overlapping batch only appends what is new
            let stats = store
                .append_incremental(&flat_rows(start, FIFTEEN_MIN_MS, first + extra, "1.5"))
                .unwrap();
            prop_assert_eq!(stats.written as i64, extra);
            prop_assert_eq!(
                store.get_last_close_time().unwrap(),
                Some(start + (first + extra) * FIFTEEN_MIN_MS - 1)
            );
        }
    }
}

mod strategy_scenarios {
    use super::*;

    fn record(low: &str, high: &str, close: &str) -> KlineRecord {
        KlineRecord::from_raw(&kline_row(0, FIFTEEN_MIN_MS, low, high, close)).unwrap()
    }

    #[test]
    fn first_tick_places_buy_below_peak() {
        let mut asset = doge(memory_store("DOGE"), &StrategyConfig::default());
        asset.observe(record("100", "100", "100"));

        assert!(asset.check_orders().is_empty());
        assert_eq!(asset.tracked_peak(), Some(dec!(100)));
        assert_eq!(asset.place_new_orders(), 1);

        assert_eq!(asset.orders().len(), 1);
        assert_eq!(asset.orders()[0].order_type, OrderType::LimitBuy);
        assert_eq!(asset.orders()[0].limit_price, dec!(90));
    }

    #[test]
    fn buy_fill_becomes_sell_at_target() {
        let mut asset = doge(memory_store("DOGE"), &StrategyConfig::default());
        asset.observe(record("100", "100", "100"));
        asset.check_orders();
        asset.place_new_orders();

        asset.observe(record("85", "92", "88"));
        let fills = asset.check_orders();

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].order_type, OrderType::LimitBuy);
        assert_eq!(fills[0].limit_price, dec!(90));
        assert_eq!(asset.orders().len(), 1);
        assert_eq!(asset.orders()[0].order_type, OrderType::LimitSell);
        assert_eq!(asset.orders()[0].limit_price, dec!(99));
    }

    #[test]
    fn peak_never_decreases() {
        let mut asset = doge(memory_store("DOGE"), &StrategyConfig::default());
        let closes = ["100", "104", "97", "110", "108", "55", "111"];
        let mut last_peak = None;
        for close in closes {
            asset.observe(record(close, close, close));
            asset.check_orders();
            asset.place_new_orders();
            let peak = asset.tracked_peak();
            assert!(peak >= last_peak);
            last_peak = peak;
        }
        assert_eq!(last_peak, Some(dec!(111)));
    }

    #[test]
    fn trailing_band_exit_moves_buy_up() {
        let config = StrategyConfig {
            band_exit_policy: BandExitPolicyKind::Trail,
            ..StrategyConfig::default()
        };
        let mut asset = doge(memory_store("DOGE"), &config);
        asset.observe(record("100", "100", "100"));
        asset.check_orders();
        asset.place_new_orders();

        asset.observe(record("118", "121", "120"));
        asset.check_orders();
        assert_eq!(asset.place_new_orders(), 1);

        assert_eq!(asset.tracked_peak(), Some(dec!(120)));
        assert_eq!(asset.orders().len(), 1);
        assert_eq!(asset.orders()[0].limit_price, dec!(108));
    }

    #[test]
    fn holding_band_exit_keeps_original_buy() {
        let mut asset = doge(memory_store("DOGE"), &StrategyConfig::default());
        asset.observe(record("100", "100", "100"));
        asset.check_orders();
        asset.place_new_orders();

        asset.observe(record("118", "121", "120"));
        asset.check_orders();
        assert_eq!(asset.place_new_orders(), 0);

        assert_eq!(asset.tracked_peak(), Some(dec!(120)));
        assert_eq!(asset.orders().len(), 1);
        assert_eq!(asset.orders()[0].limit_price, dec!(90));
    }

    #[test]
    fn rebuy_after_sell_fill() {
        let config = StrategyConfig {
            sell_fill_policy: SellFillPolicyKind::Rebuy,
            ..StrategyConfig::default()
        };
        let mut asset = doge(memory_store("DOGE"), &config);
        asset.observe(record("100", "100", "100"));
        asset.check_orders();
        asset.place_new_orders();
        asset.observe(record("85", "90", "88"));
        asset.check_orders();

        asset.observe(record("98", "100", "99.5"));
        let fills = asset.check_orders();

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].order_type, OrderType::LimitSell);
        assert_eq!(asset.orders().len(), 1);
        assert_eq!(asset.orders()[0].order_type, OrderType::LimitBuy);
        assert_eq!(asset.orders()[0].limit_price, dec!(90));
    }

    #[test]
    fn custom_params_drive_prices() {
        let config = StrategyConfig {
            params: StrategyParams {
                buy_margin: dec!(0.8),
                desired_sell_pct: dec!(1.25),
                protected_band: dec!(0.02),
            },
            ..StrategyConfig::default()
        };
        let mut asset = doge(memory_store("DOGE"), &config);
        asset.observe(record("50", "50", "50"));
        asset.check_orders();
        asset.place_new_orders();
        assert_eq!(asset.orders()[0].limit_price, dec!(40));
        assert_eq!(asset.orders()[0].band_width, dec!(0.02));

        asset.observe(record("39", "41", "40"));
        asset.check_orders();
        assert_eq!(asset.orders()[0].limit_price, dec!(50));
    }
}

mod sync_and_replay {
    use super::*;

    fn exchange() -> MockExchange {
        let start = day_start(2019, 1, 1);
        let rows = vec![
            kline_row(start, HOUR_MS, "100", "100", "100"),
            kline_row(start + HOUR_MS, HOUR_MS, "95", "98", "97"),
            kline_row(start + 2 * HOUR_MS, HOUR_MS, "85", "90", "88"),
            kline_row(start + 3 * HOUR_MS, HOUR_MS, "98", "100", "99.5"),
        ];
        MockExchange::new()
            .with_asset("DOGE")
            .with_asset("BTC")
            .with_klines("DOGEUSD", rows)
    }

    fn memory_assets(exchange: &MockExchange, config: &StrategyConfig) -> Assets {
        Assets::from_account(exchange, "USD", config, |_| {
            Ok(Box::new(MemoryStorage::new()) as Box<dyn PartitionStorage>)
        })
        .unwrap()
    }

    #[test]
    fn sync_then_simulate_one_day() {
        let exchange = exchange();
        let mut assets = memory_assets(&exchange, &StrategyConfig::default());
        let report = assets.sync_historical_klines(&exchange, KlineInterval::OneHour);
        assert!(report.failed.is_empty());
        assert_eq!(report.stats("DOGE").unwrap().written, 4);

        let summary = run_simulation(
            &mut assets,
            &SimulationConfig {
                start_date: date(2019, 1, 1),
                end_date: date(2019, 1, 2),
                interval: KlineInterval::OneHour,
            },
        );

        assert_eq!(summary.ticks, 24);
        assert_eq!(summary.asset_updates, 4);
        assert_eq!(summary.fills, 2);
        assert_eq!(summary.failures, 0);
        let doge = assets.get("DOGE").unwrap();
        assert_eq!(doge.orders().len(), 1);
        assert_eq!(doge.orders()[0].order_type, OrderType::LimitSell);
        assert_eq!(doge.tracked_peak(), Some(dec!(100)));
        assert!(assets.get("BTC").unwrap().orders().is_empty());
    }

    #[test]
    fn exchange_failure_is_isolated_per_asset() {
        let exchange = exchange().with_error("BTCUSD", "rate limited");
        let mut assets = memory_assets(&exchange, &StrategyConfig::default());
        let report = assets.sync_historical_klines(&exchange, KlineInterval::OneHour);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "BTC");
        assert!(report.failed[0].1.contains("rate limited"));
        assert_eq!(report.stats("DOGE").unwrap().written, 4);
        assert_eq!(
            assets.get("DOGE").unwrap().store().get_last().unwrap().open_time,
            day_start(2019, 1, 1) + 3 * HOUR_MS
        );
    }

    #[test]
    fn corrupt_partition_on_disk_does_not_block_other_assets() {
        let dir = tempfile::TempDir::new().unwrap();
        let aaa_dir = dir.path().join("AAA");
        fs::create_dir_all(&aaa_dir).unwrap();
        fs::write(aaa_dir.join("2019-01-01.csv"), "open_time,open\nnot-a-time,1\n").unwrap();

        let start = day_start(2019, 1, 1);
        let exchange = MockExchange::new()
            .with_asset("AAA")
            .with_asset("DOGE")
            .with_klines("AAAUSD", flat_rows(start + DAY_MS, HOUR_MS, 2, "1"))
            .with_klines("DOGEUSD", flat_rows(start, HOUR_MS, 3, "1"));
        let mut assets = Assets::from_account(&exchange, "USD", &StrategyConfig::default(), |name| {
            Ok(Box::new(LocalDiskStorage::open(dir.path(), name)?) as Box<dyn PartitionStorage>)
        })
        .unwrap();

        let report = assets.sync_historical_klines(&exchange, KlineInterval::OneHour);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "AAA");
        assert_eq!(report.stats("DOGE").unwrap().written, 3);

        let doge = fs::read_to_string(dir.path().join("DOGE").join("2019-01-01.csv")).unwrap();
        assert_eq!(doge.lines().count(), 4);
        assert!(!aaa_dir.join("2019-01-02.csv").exists());
    }

    #[test]
    fn second_sync_resumes_after_last_close() {
        let exchange = exchange();
        let mut assets = memory_assets(&exchange, &StrategyConfig::default());
        assets.sync_historical_klines(&exchange, KlineInterval::OneHour);
        let again = assets.sync_historical_klines(&exchange, KlineInterval::OneHour);
        assert!(again.failed.is_empty());
        assert_eq!(again.synced.len(), 2);
        for (_, stats) in again.synced {
            assert_eq!(stats.written, 0);
        }
    }
}
