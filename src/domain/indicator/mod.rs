//! Technical indicators over a [`BarSeries`].
//!
//! An [`IndicatorSpec`] is a typed, immutable description of one
//! parameterization. [`calculate`] adds the indicator's columns and
//! [`get_signal`] derives a -1/0/+1 signal column from them, computing the
//! indicator first when its columns are absent. Columns are named
//! `<kind>_<params>[_<source>]` so several parameterizations coexist.

pub mod bollinger;
pub mod kdj;
pub mod macd;
pub mod moving_average;
pub mod rolling;
pub mod rsi;
pub mod volume;

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::domain::error::QuantsigError;
use crate::domain::ohlcv::PriceField;
use crate::domain::series::BarSeries;

pub use bollinger::BollingerSpec;
pub use kdj::KdjSpec;
pub use macd::MacdSpec;
pub use moving_average::MovingAverageSpec;
pub use rsi::RsiSpec;
pub use volume::VolumeSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Macd,
    Bollinger,
    Rsi,
    Kdj,
    Volume,
}

impl IndicatorKind {
    pub fn tag(self) -> &'static str {
        match self {
            IndicatorKind::Sma => "sma",
            IndicatorKind::Ema => "ema",
            IndicatorKind::Macd => "macd",
            IndicatorKind::Bollinger => "bollinger",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Kdj => "kdj",
            IndicatorKind::Volume => "volume",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, QuantsigError> {
        match tag.trim().to_lowercase().as_str() {
            "ma" | "sma" => Ok(IndicatorKind::Sma),
            "ema" => Ok(IndicatorKind::Ema),
            "macd" => Ok(IndicatorKind::Macd),
            "bollinger" | "boll" => Ok(IndicatorKind::Bollinger),
            "rsi" => Ok(IndicatorKind::Rsi),
            "kdj" => Ok(IndicatorKind::Kdj),
            "volume" | "vol" => Ok(IndicatorKind::Volume),
            other => Err(QuantsigError::UnknownIndicator {
                kind: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorSpec {
    Sma(MovingAverageSpec),
    Ema(MovingAverageSpec),
    Macd(MacdSpec),
    Bollinger(BollingerSpec),
    Rsi(RsiSpec),
    Kdj(KdjSpec),
    Volume(VolumeSpec),
}

impl IndicatorSpec {
    /// Build a spec from a type tag and loosely typed parameters, filling
    /// defaults for absent keys.
    pub fn from_tag(tag: &str, params: &IndicatorParams) -> Result<Self, QuantsigError> {
        let source = params.source()?;
        let spec = match IndicatorKind::from_tag(tag)? {
            IndicatorKind::Sma => IndicatorSpec::Sma(MovingAverageSpec {
                window: params.window("window", 20)?,
                source,
            }),
            IndicatorKind::Ema => IndicatorSpec::Ema(MovingAverageSpec {
                window: params.window("window", 20)?,
                source,
            }),
            IndicatorKind::Macd => IndicatorSpec::Macd(MacdSpec {
                fast: params.window("fast", 12)?,
                slow: params.window("slow", 26)?,
                signal: params.window("signal", 9)?,
                source,
            }),
            IndicatorKind::Bollinger => IndicatorSpec::Bollinger(BollingerSpec {
                window: params.window("window", 20)?,
                multiplier: params.number("multiplier", 2.0)?,
                source,
            }),
            IndicatorKind::Rsi => IndicatorSpec::Rsi(RsiSpec {
                window: params.window("window", 14)?,
                source,
            }),
            IndicatorKind::Kdj => IndicatorSpec::Kdj(KdjSpec {
                k_window: params.window("k_window", 9)?,
                d_window: params.window("d_window", 3)?,
                j_window: params.window("j_window", 3)?,
            }),
            IndicatorKind::Volume => IndicatorSpec::Volume(VolumeSpec {
                window: params.window("window", 20)?,
            }),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn kind(&self) -> IndicatorKind {
        match self {
            IndicatorSpec::Sma(_) => IndicatorKind::Sma,
            IndicatorSpec::Ema(_) => IndicatorKind::Ema,
            IndicatorSpec::Macd(_) => IndicatorKind::Macd,
            IndicatorSpec::Bollinger(_) => IndicatorKind::Bollinger,
            IndicatorSpec::Rsi(_) => IndicatorKind::Rsi,
            IndicatorSpec::Kdj(_) => IndicatorKind::Kdj,
            IndicatorSpec::Volume(_) => IndicatorKind::Volume,
        }
    }

    /// Reject non-positive windows and inconsistent parameter combinations.
    pub fn validate(&self) -> Result<(), QuantsigError> {
        match self {
            IndicatorSpec::Sma(s) | IndicatorSpec::Ema(s) => s.validate(),
            IndicatorSpec::Macd(s) => s.validate(),
            IndicatorSpec::Bollinger(s) => s.validate(),
            IndicatorSpec::Rsi(s) => s.validate(),
            IndicatorSpec::Kdj(s) => s.validate(),
            IndicatorSpec::Volume(s) => s.validate(),
        }
    }

    /// Base name shared by every column this spec produces.
    pub fn column_name(&self) -> String {
        match self {
            IndicatorSpec::Sma(s) => s.column_name("sma"),
            IndicatorSpec::Ema(s) => s.column_name("ema"),
            IndicatorSpec::Macd(s) => s.column_name(),
            IndicatorSpec::Bollinger(s) => s.column_name(),
            IndicatorSpec::Rsi(s) => s.column_name(),
            IndicatorSpec::Kdj(s) => s.column_name(),
            IndicatorSpec::Volume(s) => s.column_name(),
        }
    }

    /// Every column [`calculate`] adds for this spec.
    pub fn output_columns(&self) -> Vec<String> {
        let base = self.column_name();
        let suffixes: &[&str] = match self {
            IndicatorSpec::Sma(_) | IndicatorSpec::Ema(_) | IndicatorSpec::Rsi(_) => {
                return vec![base];
            }
            IndicatorSpec::Macd(_) => &["", "_signal", "_hist"],
            IndicatorSpec::Bollinger(_) => &["_mid", "_upper", "_lower", "_bandwidth", "_pct_b"],
            IndicatorSpec::Kdj(_) => &["_k", "_d", "_j"],
            IndicatorSpec::Volume(_) => &[
                "_ma",
                "_ratio",
                "_change",
                "_buy",
                "_sell",
                "_buy_sell_ratio",
            ],
        };
        suffixes.iter().map(|s| format!("{base}{s}")).collect()
    }

    /// Name of the signal column [`get_signal`] adds for `params`.
    pub fn signal_column(&self, params: &SignalParams) -> String {
        match (self, params) {
            (
                IndicatorSpec::Sma(s) | IndicatorSpec::Ema(s),
                SignalParams::MaCross { short_window },
            ) => {
                let mut name = format!("{}_{short_window}_{}", self.kind(), s.window);
                if s.source != PriceField::Close {
                    name.push('_');
                    name.push_str(price_field_tag(s.source));
                }
                name.push_str("_cross_signal");
                name
            }
            _ => format!("{}_{}_signal", self.column_name(), params.tag()),
        }
    }

    pub fn description(&self) -> String {
        match self {
            IndicatorSpec::Sma(s) => format!("SMA window={}", s.window),
            IndicatorSpec::Ema(s) => format!("EMA window={}", s.window),
            IndicatorSpec::Macd(s) => {
                format!("MACD fast={} slow={} signal={}", s.fast, s.slow, s.signal)
            }
            IndicatorSpec::Bollinger(s) => {
                format!("Bollinger window={} multiplier={}", s.window, s.multiplier)
            }
            IndicatorSpec::Rsi(s) => format!("RSI window={}", s.window),
            IndicatorSpec::Kdj(s) => {
                format!("KDJ k={} d={} j={}", s.k_window, s.d_window, s.j_window)
            }
            IndicatorSpec::Volume(s) => format!("Volume window={}", s.window),
        }
    }
}

/// Signal derivation selected for an indicator. Not every indicator
/// supports every variant; mismatches are rejected before computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalParams {
    /// Price crosses its moving average.
    Trend,
    /// Short-window average crosses this (long) window.
    MaCross { short_window: usize },
    /// MACD line crosses its signal line, or K crosses D.
    Cross,
    /// Price extremum unconfirmed by the oscillator.
    Divergence,
    /// Close leaves the Bollinger band.
    Breakout,
    /// Close touches a Bollinger band.
    MeanReversion,
    /// Oscillator leaves an overbought/oversold band.
    Level { overbought: f64, oversold: f64 },
    /// Volume ratio rises above `multiple`.
    Surge { multiple: f64 },
}

impl SignalParams {
    /// Parse a signal type tag, with defaults appropriate to `kind`.
    pub fn from_tag(
        kind: IndicatorKind,
        tag: &str,
        params: &IndicatorParams,
    ) -> Result<Self, QuantsigError> {
        let signal = match tag.trim().to_lowercase().as_str() {
            "trend" => SignalParams::Trend,
            "cross" if matches!(kind, IndicatorKind::Sma | IndicatorKind::Ema) => {
                SignalParams::MaCross {
                    short_window: params.window("short_window", 5)?,
                }
            }
            "cross" => SignalParams::Cross,
            "divergence" => SignalParams::Divergence,
            "breakout" => SignalParams::Breakout,
            "mean_reversion" => SignalParams::MeanReversion,
            "level" => {
                let (ob, os) = if kind == IndicatorKind::Kdj {
                    (80.0, 20.0)
                } else {
                    (70.0, 30.0)
                };
                SignalParams::Level {
                    overbought: params.number("overbought", ob)?,
                    oversold: params.number("oversold", os)?,
                }
            }
            "surge" => SignalParams::Surge {
                multiple: params.number("surge", 2.0)?,
            },
            other => {
                return Err(QuantsigError::invalid_parameter(
                    "signal_type",
                    format!("unknown signal type {other}"),
                ));
            }
        };
        Ok(signal)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            SignalParams::Trend => "trend",
            SignalParams::MaCross { .. } | SignalParams::Cross => "cross",
            SignalParams::Divergence => "divergence",
            SignalParams::Breakout => "breakout",
            SignalParams::MeanReversion => "mean_reversion",
            SignalParams::Level { .. } => "level",
            SignalParams::Surge { .. } => "surge",
        }
    }
}

/// Loose key/value parameters, as read from a command line or config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorParams {
    values: BTreeMap<String, String>,
}

impl IndicatorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    /// Parse `key=value` pairs.
    pub fn parse_pairs<'a>(
        pairs: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, QuantsigError> {
        let mut params = Self::new();
        for pair in pairs {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                QuantsigError::invalid_parameter(pair, "expected key=value")
            })?;
            params = params.with(key.trim(), value.trim());
        }
        Ok(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// A window length `>= 1`.
    pub fn window(&self, key: &str, default: usize) -> Result<usize, QuantsigError> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        let value: i64 = raw.parse().map_err(|_| {
            QuantsigError::invalid_parameter(key, format!("not an integer: {raw}"))
        })?;
        if value < 1 {
            return Err(QuantsigError::invalid_parameter(key, "must be >= 1"));
        }
        Ok(value as usize)
    }

    pub fn number(&self, key: &str, default: f64) -> Result<f64, QuantsigError> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(QuantsigError::invalid_parameter(
                key,
                format!("not a number: {raw}"),
            )),
        }
    }

    pub fn source(&self) -> Result<PriceField, QuantsigError> {
        match self.get("source") {
            None => Ok(PriceField::Close),
            Some(raw) => PriceField::parse(raw).ok_or_else(|| {
                QuantsigError::invalid_parameter("source", format!("unknown price field {raw}"))
            }),
        }
    }
}

pub(crate) fn price_field_tag(field: PriceField) -> &'static str {
    match field {
        PriceField::Open => "open",
        PriceField::High => "high",
        PriceField::Low => "low",
        PriceField::Close => "close",
    }
}

/// `<base>` for close-sourced indicators, `<base>_<field>` otherwise.
pub(crate) fn with_source(base: String, source: PriceField) -> String {
    if source == PriceField::Close {
        base
    } else {
        format!("{base}_{}", price_field_tag(source))
    }
}

pub(crate) fn require_window(name: &str, value: usize, min: usize) -> Result<(), QuantsigError> {
    if value < min {
        return Err(QuantsigError::invalid_parameter(
            name,
            format!("must be >= {min}, got {value}"),
        ));
    }
    Ok(())
}

pub(crate) fn unsupported(spec: &IndicatorSpec, params: &SignalParams) -> QuantsigError {
    QuantsigError::invalid_parameter(
        "signal_type",
        format!("{} does not support {} signals", spec.kind(), params.tag()),
    )
}

/// Add the indicator's columns to a copy of `series`.
pub fn calculate(series: &BarSeries, spec: &IndicatorSpec) -> Result<BarSeries, QuantsigError> {
    spec.validate()?;
    match spec {
        IndicatorSpec::Sma(s) => moving_average::calculate_sma(series, s),
        IndicatorSpec::Ema(s) => moving_average::calculate_ema(series, s),
        IndicatorSpec::Macd(s) => macd::calculate_macd(series, s),
        IndicatorSpec::Bollinger(s) => bollinger::calculate_bollinger(series, s),
        IndicatorSpec::Rsi(s) => rsi::calculate_rsi(series, s),
        IndicatorSpec::Kdj(s) => kdj::calculate_kdj(series, s),
        IndicatorSpec::Volume(s) => volume::calculate_volume(series, s),
    }
}

/// `series` with the indicator's columns present, computing them only if
/// missing.
pub(crate) fn ensure(series: &BarSeries, spec: &IndicatorSpec) -> Result<BarSeries, QuantsigError> {
    if spec.output_columns().iter().all(|c| series.has_column(c)) {
        Ok(series.clone())
    } else {
        calculate(series, spec)
    }
}

/// Add the signal column named by [`IndicatorSpec::signal_column`].
pub fn get_signal(
    series: &BarSeries,
    spec: &IndicatorSpec,
    params: &SignalParams,
) -> Result<BarSeries, QuantsigError> {
    spec.validate()?;
    match spec {
        IndicatorSpec::Sma(_) | IndicatorSpec::Ema(_) => {
            moving_average::moving_average_signal(series, spec, params)
        }
        IndicatorSpec::Macd(s) => macd::macd_signal(series, s, params),
        IndicatorSpec::Bollinger(s) => bollinger::bollinger_signal(series, s, params),
        IndicatorSpec::Rsi(s) => rsi::rsi_signal(series, s, params),
        IndicatorSpec::Kdj(s) => kdj::kdj_signal(series, s, params),
        IndicatorSpec::Volume(s) => volume::volume_signal(series, s, params),
    }
}

/// Compute each distinct spec once.
pub fn calculate_all(
    series: &BarSeries,
    specs: &[IndicatorSpec],
) -> Result<BarSeries, QuantsigError> {
    for spec in specs {
        spec.validate()?;
    }
    let mut out = series.clone();
    for (i, spec) in specs.iter().enumerate() {
        if specs[..i].contains(spec) {
            continue;
        }
        out = ensure(&out, spec)?;
    }
    debug!(
        symbol = series.symbol(),
        indicators = specs.len(),
        bars = series.len(),
        "indicators computed"
    );
    Ok(out)
}

/// An indicator plus the signal to derive from it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub spec: IndicatorSpec,
    pub params: SignalParams,
}

impl SignalRequest {
    pub fn new(spec: IndicatorSpec, params: SignalParams) -> Self {
        Self { spec, params }
    }

    pub fn column(&self) -> String {
        self.spec.signal_column(&self.params)
    }
}

/// Derive every requested signal column, computing shared indicators once.
pub fn signals_all(
    series: &BarSeries,
    requests: &[SignalRequest],
) -> Result<BarSeries, QuantsigError> {
    let specs: Vec<IndicatorSpec> = requests.iter().map(|r| r.spec.clone()).collect();
    let mut out = calculate_all(series, &specs)?;
    for request in requests {
        if !out.has_column(&request.column()) {
            out = get_signal(&out, &request.spec, &request.params)?;
        }
    }
    Ok(out)
}
