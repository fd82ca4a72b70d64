//! Strategy registry: maps the `[strategy]` section's `type` / `subtype`
//! tags to a validated [`Strategy`].
//!
//! ```ini
//! [strategy]
//! type = breakout
//! subtype = high_low
//! lookback_period = 20
//! breakout_threshold = 0.01
//! confirmation_days = 2
//! ```

use crate::domain::error::QuantsigError;
use crate::domain::indicator::{BollingerSpec, MacdSpec, RsiSpec};
use crate::domain::ohlcv::PriceField;
use crate::domain::strategy::{
    BollingerBreakoutStrategy, BollingerMode, DynamicGridStrategy, GridCenter, GridStrategy,
    HighLowBreakoutStrategy, MaCrossStrategy, MaType, MacdCrossStrategy, RsiLevelStrategy,
    Strategy, VolumeBreakoutStrategy,
};
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "strategy";

fn invalid(key: &str, reason: impl Into<String>) -> QuantsigError {
    QuantsigError::ConfigInvalid {
        section: SECTION.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn unknown(kind: &str, subtype: Option<&str>) -> QuantsigError {
    QuantsigError::UnknownStrategy {
        kind: kind.to_string(),
        subtype: subtype.map(str::to_string),
    }
}

fn get_window(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, QuantsigError> {
    let value = config.get_int(SECTION, key, default as i64)?;
    usize::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| invalid(key, format!("{key} must be a positive integer, got {value}")))
}

fn get_source(config: &dyn ConfigPort) -> Result<PriceField, QuantsigError> {
    match config.get_string(SECTION, "price_key") {
        None => Ok(PriceField::Close),
        Some(s) => PriceField::parse(&s)
            .ok_or_else(|| invalid("price_key", format!("unknown price field '{s}'"))),
    }
}

fn required_price(config: &dyn ConfigPort, key: &str) -> Result<f64, QuantsigError> {
    let raw = config
        .get_string(SECTION, key)
        .ok_or_else(|| QuantsigError::ConfigMissing {
            section: SECTION.to_string(),
            key: key.to_string(),
        })?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(key, format!("{key} must be a number, got '{raw}'")))
}

/// Build the strategy configured in `[strategy]`.
///
/// Unknown tags fail with [`QuantsigError::UnknownStrategy`]; parameter
/// violations fail before any data is touched.
pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, QuantsigError> {
    let kind = config
        .get_string(SECTION, "type")
        .map(|s| s.trim().to_lowercase())
        .ok_or_else(|| QuantsigError::ConfigMissing {
            section: SECTION.to_string(),
            key: "type".to_string(),
        })?;
    let subtype = config
        .get_string(SECTION, "subtype")
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    match (kind.as_str(), subtype.as_deref()) {
        ("macd_cross" | "macd", _) => build_macd_cross(config),
        ("ma_cross", sub) => build_ma_cross(config, sub),
        ("rsi" | "rsi_level", _) => build_rsi(config),
        ("breakout", Some("bollinger")) => build_bollinger(config),
        ("breakout", Some("high_low")) => build_high_low(config),
        ("breakout", Some("volume")) => build_volume_breakout(config),
        ("grid", None | Some("fixed")) => build_fixed_grid(config),
        ("grid", Some("dynamic")) => build_dynamic_grid(config),
        (kind, sub) => Err(unknown(kind, sub)),
    }
}

fn build_macd_cross(config: &dyn ConfigPort) -> Result<Strategy, QuantsigError> {
    let mut spec = MacdSpec::new(
        get_window(config, "fast_period", 12)?,
        get_window(config, "slow_period", 26)?,
        get_window(config, "signal_period", 9)?,
    );
    spec.source = get_source(config)?;
    Ok(Strategy::MacdCross(MacdCrossStrategy::new(spec)?))
}

fn build_ma_cross(config: &dyn ConfigPort, subtype: Option<&str>) -> Result<Strategy, QuantsigError> {
    let tag = match subtype {
        Some(s) => s.to_string(),
        None => config
            .get_string(SECTION, "ma_type")
            .unwrap_or_else(|| "sma".to_string()),
    };
    let ma_type = MaType::parse(&tag).ok_or_else(|| unknown("ma_cross", Some(&tag)))?;
    Ok(Strategy::MaCross(MaCrossStrategy::new(
        get_window(config, "fast_period", 5)?,
        get_window(config, "slow_period", 20)?,
        ma_type,
    )?))
}

fn build_rsi(config: &dyn ConfigPort) -> Result<Strategy, QuantsigError> {
    let mut spec = RsiSpec::new(get_window(config, "rsi_period", 14)?);
    spec.source = get_source(config)?;
    Ok(Strategy::RsiLevel(RsiLevelStrategy::new(
        spec,
        config.get_double(SECTION, "overbought", 70.0)?,
        config.get_double(SECTION, "oversold", 30.0)?,
    )?))
}

fn build_bollinger(config: &dyn ConfigPort) -> Result<Strategy, QuantsigError> {
    let mut bands = BollingerSpec::new(
        get_window(config, "window", 20)?,
        config.get_double(SECTION, "std_dev", 2.0)?,
    );
    bands.source = get_source(config)?;
    let mode = match config.get_string(SECTION, "breakout_type") {
        None => BollingerMode::Breakout,
        Some(s) => BollingerMode::parse(&s)
            .ok_or_else(|| invalid("breakout_type", format!("unknown breakout type '{s}'")))?,
    };
    Ok(Strategy::BollingerBreakout(BollingerBreakoutStrategy::new(
        bands, mode,
    )?))
}

fn build_high_low(config: &dyn ConfigPort) -> Result<Strategy, QuantsigError> {
    Ok(Strategy::HighLowBreakout(HighLowBreakoutStrategy::new(
        get_window(config, "lookback_period", 20)?,
        config.get_double(SECTION, "breakout_threshold", 0.0)?,
        get_window(config, "confirmation_days", 1)?,
    )?))
}

fn build_volume_breakout(config: &dyn ConfigPort) -> Result<Strategy, QuantsigError> {
    Ok(Strategy::VolumeBreakout(VolumeBreakoutStrategy::new(
        get_window(config, "price_lookback", 20)?,
        get_window(config, "volume_lookback", 20)?,
        config.get_double(SECTION, "price_threshold", 0.0)?,
        config.get_double(SECTION, "volume_threshold", 1.5)?,
    )?))
}

fn grid_num(config: &dyn ConfigPort, default: i64) -> Result<usize, QuantsigError> {
    let value = config.get_int(SECTION, "grid_num", default)?;
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| QuantsigError::InvalidGrid {
            reason: format!("grid_num must be greater than 0, got {value}"),
        })
}

fn build_fixed_grid(config: &dyn ConfigPort) -> Result<Strategy, QuantsigError> {
    let upper = required_price(config, "upper_price")?;
    let lower = required_price(config, "lower_price")?;
    Ok(Strategy::Grid(GridStrategy::new(
        upper,
        lower,
        grid_num(config, 10)?,
    )?))
}

fn build_dynamic_grid(config: &dyn ConfigPort) -> Result<Strategy, QuantsigError> {
    let center = match config.get_string(SECTION, "center_price") {
        Some(_) => GridCenter::Fixed(required_price(config, "center_price")?),
        None => GridCenter::RollingMean,
    };
    Ok(Strategy::DynamicGrid(DynamicGridStrategy::new(
        get_window(config, "volatility_window", 20)?,
        grid_num(config, 10)?,
        config.get_double(SECTION, "volatility_multiplier", 2.0)?,
        center,
    )?))
}
