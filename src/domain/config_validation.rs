//! Configuration validation.
//!
//! Validates config fields before a sync or simulation runs.

use crate::domain::error::PeakTrailError;
use crate::domain::kline::KlineInterval;
use crate::domain::strategy::{BandExitPolicyKind, SellFillPolicyKind};
use crate::domain::universe::parse_assets;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub const DEFAULT_QUOTE_ASSET: &str = "USD";

pub fn validate_exchange_config(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    validate_quote_asset(config)?;
    validate_starting_cash(config)?;
    validate_interval(config)?;
    validate_assets(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    validate_buy_margin(config)?;
    validate_desired_sell_pct(config)?;
    validate_protected_band(config)?;
    validate_policies(config)?;
    Ok(())
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "simulation",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> PeakTrailError {
    PeakTrailError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Read an optional decimal, mapping parse failures to `ConfigInvalid`.
pub fn read_decimal(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Decimal>, PeakTrailError> {
    config
        .get_decimal(section, key)
        .transpose()
        .map_err(|reason| invalid(section, key, &reason))
}

pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, PeakTrailError> {
    match config.get_string("simulation", field) {
        None => Err(PeakTrailError::ConfigMissing {
            section: "simulation".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "simulation",
                field,
                &format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

pub fn quote_asset(config: &dyn ConfigPort) -> String {
    config
        .get_string("exchange", "quote_asset")
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_QUOTE_ASSET.to_string())
}

fn validate_quote_asset(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    match config.get_string("exchange", "quote_asset") {
        Some(s) if s.trim().is_empty() => Err(invalid(
            "exchange",
            "quote_asset",
            "quote_asset must not be empty",
        )),
        _ => Ok(()),
    }
}

fn validate_starting_cash(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    if let Some(value) = read_decimal(config, "exchange", "starting_cash")? {
        if value < Decimal::ZERO {
            return Err(invalid(
                "exchange",
                "starting_cash",
                "starting_cash must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    if let Some(value) = config.get_string("exchange", "interval") {
        value
            .parse::<KlineInterval>()
            .map_err(|reason| invalid("exchange", "interval", &reason))?;
    }
    Ok(())
}

fn validate_assets(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    match config.get_string("exchange", "assets") {
        Some(list) if !list.trim().is_empty() => {
            parse_assets(&list, &quote_asset(config))
                .map_err(|e| invalid("exchange", "assets", &e.to_string()))?;
            Ok(())
        }
        _ => Err(PeakTrailError::ConfigMissing {
            section: "exchange".to_string(),
            key: "assets".to_string(),
        }),
    }
}

fn validate_buy_margin(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    if let Some(value) = read_decimal(config, "strategy", "buy_margin")? {
        if value <= Decimal::ZERO || value >= Decimal::ONE {
            return Err(invalid(
                "strategy",
                "buy_margin",
                "buy_margin must be between 0 and 1 (exclusive)",
            ));
        }
    }
    Ok(())
}

fn validate_desired_sell_pct(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    if let Some(value) = read_decimal(config, "strategy", "desired_sell_pct")? {
        if value <= Decimal::ONE {
            return Err(invalid(
                "strategy",
                "desired_sell_pct",
                "desired_sell_pct must be greater than 1",
            ));
        }
    }
    Ok(())
}

fn validate_protected_band(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    if let Some(value) = read_decimal(config, "strategy", "protected_band")? {
        if value < Decimal::ZERO || value >= Decimal::ONE {
            return Err(invalid(
                "strategy",
                "protected_band",
                "protected_band must be at least 0 and below 1",
            ));
        }
    }
    Ok(())
}

fn validate_policies(config: &dyn ConfigPort) -> Result<(), PeakTrailError> {
    if let Some(value) = config.get_string("strategy", "sell_fill_policy") {
        value
            .parse::<SellFillPolicyKind>()
            .map_err(|reason| invalid("strategy", "sell_fill_policy", &reason))?;
    }
    if let Some(value) = config.get_string("strategy", "band_exit_policy") {
        value
            .parse::<BandExitPolicyKind>()
            .map_err(|reason| invalid("strategy", "band_exit_policy", &reason))?;
    }
    Ok(())
}
