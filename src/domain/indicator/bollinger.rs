//! Bollinger Bands.
//!
//! - Middle: SMA over n prices
//! - Upper/Lower: middle +/- multiplier x sample standard deviation
//! - Bandwidth: (upper - lower) / middle
//! - %B: (price - lower) / (upper - lower), undefined for a zero-width band
//!
//! Default parameters: window=20, multiplier=2.0. Warmup: first (n-1) bars.

use crate::domain::error::QuantsigError;
use crate::domain::indicator::rolling::{ratio, rolling_mean, rolling_std, zip_with};
use crate::domain::indicator::{
    IndicatorSpec, SignalParams, ensure, require_window, unsupported, with_source,
};
use crate::domain::ohlcv::PriceField;
use crate::domain::series::{BarSeries, Column};
use crate::domain::signal::{Signal, band_touch_signals, cross_signals};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerSpec {
    pub window: usize,
    pub multiplier: f64,
    pub source: PriceField,
}

impl BollingerSpec {
    pub fn new(window: usize, multiplier: f64) -> Self {
        Self {
            window,
            multiplier,
            source: PriceField::Close,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), QuantsigError> {
        require_window("window", self.window, 2)?;
        if !(self.multiplier.is_finite() && self.multiplier > 0.0) {
            return Err(QuantsigError::invalid_parameter(
                "multiplier",
                format!("must be positive, got {}", self.multiplier),
            ));
        }
        Ok(())
    }

    pub(crate) fn column_name(&self) -> String {
        with_source(
            format!("bollinger_{}_{}", self.window, self.multiplier),
            self.source,
        )
    }

    pub fn mid_column(&self) -> String {
        format!("{}_mid", self.column_name())
    }

    pub fn upper_column(&self) -> String {
        format!("{}_upper", self.column_name())
    }

    pub fn lower_column(&self) -> String {
        format!("{}_lower", self.column_name())
    }
}

impl Default for BollingerSpec {
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}

pub fn calculate_bollinger(
    series: &BarSeries,
    spec: &BollingerSpec,
) -> Result<BarSeries, QuantsigError> {
    let prices = series.prices(spec.source);
    let mid = rolling_mean(&prices, spec.window);
    let std = rolling_std(&prices, spec.window);
    let k = spec.multiplier;
    let upper = zip_with(&mid, &std, |m, s| m + k * s);
    let lower = zip_with(&mid, &std, |m, s| m - k * s);
    let width = zip_with(&upper, &lower, |u, l| u - l);
    let bandwidth = ratio(&width, &mid);
    let pct_b = ratio(&zip_with(&prices, &lower, |p, l| p - l), &width);

    let base = spec.column_name();
    series
        .clone()
        .with_column(spec.mid_column(), mid)?
        .with_column(spec.upper_column(), upper)?
        .with_column(spec.lower_column(), lower)?
        .with_column(format!("{base}_bandwidth"), bandwidth)?
        .with_column(format!("{base}_pct_b"), pct_b)
}

/// Buy when price closes above the upper band after being at or below it;
/// sell when it closes below the lower band after being at or above it.
fn breakout(prices: &[Option<f64>], upper: &[Option<f64>], lower: &[Option<f64>]) -> Column {
    let up = cross_signals(prices, upper);
    let down = cross_signals(prices, lower);
    up.iter()
        .zip(&down)
        .map(|(u, d)| {
            let (u, d) = ((*u)?, (*d)?);
            let signal = if d < 0.0 {
                Signal::Sell
            } else if u > 0.0 {
                Signal::Buy
            } else {
                Signal::Hold
            };
            Some(signal.as_f64())
        })
        .collect()
}

pub fn bollinger_signal(
    series: &BarSeries,
    spec: &BollingerSpec,
    params: &SignalParams,
) -> Result<BarSeries, QuantsigError> {
    let wrapped = IndicatorSpec::Bollinger(*spec);
    let out = ensure(series, &wrapped)?;
    let prices = out.prices(spec.source);
    let upper = out.require_column(&spec.upper_column())?;
    let lower = out.require_column(&spec.lower_column())?;
    let signals = match params {
        SignalParams::Breakout => breakout(&prices, upper, lower),
        SignalParams::MeanReversion => band_touch_signals(&prices, upper, lower),
        _ => return Err(unsupported(&wrapped, params)),
    };
    out.with_column(wrapped.signal_column(params), signals)
}
