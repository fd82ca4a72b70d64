//! Configuration validation and typed config builders.
//!
//! Validators run before any data is loaded and name the offending section
//! and key. A key that is present but unparsable is an error, never a silent
//! fallback to its default.

use crate::domain::backtest::BacktestConfig;
use crate::domain::decision::DataRequest;
use crate::domain::error::QuantsigError;
use crate::domain::risk::RiskConfig;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: &str) -> QuantsigError {
    QuantsigError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), QuantsigError> {
    build_backtest_config(config).map(|_| ())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), QuantsigError> {
    build_risk_config(config).map(|_| ())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), QuantsigError> {
    build_data_request(config).map(|_| ())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<f64, QuantsigError> {
    let value = config.get_double("backtest", "initial_capital", 10_000.0)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(value)
}

fn validate_position_size(config: &dyn ConfigPort) -> Result<f64, QuantsigError> {
    let value = config.get_double("backtest", "position_size", 1.0)?;
    if !(value > 0.0 && value <= 1.0) {
        return Err(invalid(
            "backtest",
            "position_size",
            "position_size must be in (0, 1]",
        ));
    }
    Ok(value)
}

fn validate_commission(config: &dyn ConfigPort) -> Result<f64, QuantsigError> {
    let value = config.get_double("backtest", "commission", 0.0)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "commission",
            "commission must be in [0, 1)",
        ));
    }
    Ok(value)
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<f64, QuantsigError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.02)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(value)
}

fn validate_shares_per_grid(config: &dyn ConfigPort) -> Result<f64, QuantsigError> {
    let value = config.get_double("backtest", "shares_per_grid", 1.0)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            "backtest",
            "shares_per_grid",
            "shares_per_grid must be positive",
        ));
    }
    Ok(value)
}

fn validate_max_position_fraction(config: &dyn ConfigPort) -> Result<f64, QuantsigError> {
    let value = config.get_double("risk", "max_position_fraction", 0.1)?;
    if !(value > 0.0 && value <= 1.0) {
        return Err(invalid(
            "risk",
            "max_position_fraction",
            "max_position_fraction must be in (0, 1]",
        ));
    }
    Ok(value)
}

fn validate_min_notional(config: &dyn ConfigPort) -> Result<f64, QuantsigError> {
    let value = config.get_double("risk", "min_notional", 10.0)?;
    if !(value.is_finite() && value >= 0.0) {
        return Err(invalid(
            "risk",
            "min_notional",
            "min_notional must be non-negative",
        ));
    }
    Ok(value)
}

fn validate_exit_pct(
    config: &dyn ConfigPort,
    key: &str,
    default: f64,
) -> Result<f64, QuantsigError> {
    let value = config.get_double("risk", key, default)?;
    if !(value.is_finite() && value >= 0.0) {
        return Err(invalid("risk", key, &format!("{key} must be non-negative")));
    }
    Ok(value)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, QuantsigError> {
    let backtest = BacktestConfig {
        initial_capital: validate_initial_capital(config)?,
        position_size: validate_position_size(config)?,
        commission: validate_commission(config)?,
        risk_free_rate: validate_risk_free_rate(config)?,
        shares_per_grid: validate_shares_per_grid(config)?,
    };
    backtest.validate()?;
    Ok(backtest)
}

pub fn build_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, QuantsigError> {
    let risk = RiskConfig {
        max_position_fraction: validate_max_position_fraction(config)?,
        min_notional: validate_min_notional(config)?,
        stop_loss_pct: validate_exit_pct(config, "stop_loss_pct", 0.05)?,
        take_profit_pct: validate_exit_pct(config, "take_profit_pct", 0.1)?,
    };
    risk.validate()?;
    Ok(risk)
}

pub fn build_data_request(config: &dyn ConfigPort) -> Result<DataRequest, QuantsigError> {
    let defaults = DataRequest::default();
    let timeframe = match config.get_string("data", "timeframe") {
        Some(raw) if raw.trim().is_empty() => {
            return Err(invalid("data", "timeframe", "timeframe must not be empty"));
        }
        Some(raw) => raw.trim().to_string(),
        None => defaults.timeframe,
    };
    let limit = config.get_int("data", "limit", defaults.limit as i64)?;
    let limit = usize::try_from(limit)
        .ok()
        .filter(|l| *l >= 2)
        .ok_or_else(|| invalid("data", "limit", "limit must be at least 2"))?;
    Ok(DataRequest { timeframe, limit })
}
