//! Simple and exponential moving averages.
//!
//! SMA(n)[i] = mean of the last n prices; first (n-1) bars undefined.
//! EMA(n): k = 2/(n+1), seeded with the first price, so it is defined from
//! bar 0. EMA[i] = P[i]*k + EMA[i-1]*(1-k).

use crate::domain::error::QuantsigError;
use crate::domain::indicator::rolling::{ema_span, rolling_mean};
use crate::domain::indicator::{
    IndicatorSpec, SignalParams, ensure, require_window, unsupported, with_source,
};
use crate::domain::ohlcv::PriceField;
use crate::domain::series::{BarSeries, Column};
use crate::domain::signal::cross_signals;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverageSpec {
    pub window: usize,
    pub source: PriceField,
}

impl MovingAverageSpec {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            source: PriceField::Close,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), QuantsigError> {
        require_window("window", self.window, 1)
    }

    pub(crate) fn column_name(&self, kind: &str) -> String {
        with_source(format!("{kind}_{}", self.window), self.source)
    }
}

impl Default for MovingAverageSpec {
    fn default() -> Self {
        Self::new(20)
    }
}

pub fn calculate_sma(
    series: &BarSeries,
    spec: &MovingAverageSpec,
) -> Result<BarSeries, QuantsigError> {
    let values = rolling_mean(&series.prices(spec.source), spec.window);
    series.clone().with_column(spec.column_name("sma"), values)
}

pub fn calculate_ema(
    series: &BarSeries,
    spec: &MovingAverageSpec,
) -> Result<BarSeries, QuantsigError> {
    let values = ema_span(&series.prices(spec.source), spec.window);
    series.clone().with_column(spec.column_name("ema"), values)
}

fn same_kind(spec: &IndicatorSpec, inner: MovingAverageSpec) -> IndicatorSpec {
    match spec {
        IndicatorSpec::Ema(_) => IndicatorSpec::Ema(inner),
        _ => IndicatorSpec::Sma(inner),
    }
}

fn column_of(series: &BarSeries, spec: &IndicatorSpec) -> Result<Column, QuantsigError> {
    Ok(series.require_column(&spec.column_name())?.to_vec())
}

/// Trend: price crosses the average. Cross: a short-window average of the
/// same kind crosses this (long-window) average.
pub fn moving_average_signal(
    series: &BarSeries,
    spec: &IndicatorSpec,
    params: &SignalParams,
) -> Result<BarSeries, QuantsigError> {
    let (IndicatorSpec::Sma(inner) | IndicatorSpec::Ema(inner)) = spec else {
        return Err(unsupported(spec, params));
    };
    let out = ensure(series, spec)?;
    let long = column_of(&out, spec)?;
    let signals = match params {
        SignalParams::Trend => cross_signals(&out.prices(inner.source), &long),
        SignalParams::MaCross { short_window } => {
            require_window("short_window", *short_window, 1)?;
            if *short_window >= inner.window {
                return Err(QuantsigError::invalid_parameter(
                    "short_window",
                    format!(
                        "must be below the long window {}, got {short_window}",
                        inner.window
                    ),
                ));
            }
            let short_spec = same_kind(
                spec,
                MovingAverageSpec {
                    window: *short_window,
                    source: inner.source,
                },
            );
            let with_short = ensure(&out, &short_spec)?;
            let short = column_of(&with_short, &short_spec)?;
            let name = spec.signal_column(params);
            return with_short.with_column(name, cross_signals(&short, &long));
        }
        _ => return Err(unsupported(spec, params)),
    };
    out.with_column(spec.signal_column(params), signals)
}
