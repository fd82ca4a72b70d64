//! KDJ stochastic oscillator.
//!
//! RSV = 100 * (close - LLV(low, n)) / (HHV(high, n) - LLV(low, n))
//! K = RSV smoothed with alpha = 1/d_window
//! D = K smoothed with alpha = 1/j_window
//! J = 3K - 2D
//!
//! The d/j windows are periods (alpha = 1/n), not EMA spans
//! (alpha = 2/(n+1)): with the default 3 this is the usual 2/3 previous +
//! 1/3 current KDJ recurrence. Smoothing is seeded with the first defined RSV.
//! A flat window (HHV == LLV) has no RSV and K/D carry their previous value.

use crate::domain::error::QuantsigError;
use crate::domain::indicator::rolling::{ewm, rolling_max, rolling_min, zip_with};
use crate::domain::indicator::{IndicatorSpec, SignalParams, ensure, require_window, unsupported};
use crate::domain::ohlcv::PriceField;
use crate::domain::series::{BarSeries, Column};
use crate::domain::signal::{band_exit_signals, cross_signals};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdjSpec {
    pub k_window: usize,
    pub d_window: usize,
    pub j_window: usize,
}

impl KdjSpec {
    pub fn new(k_window: usize, d_window: usize, j_window: usize) -> Self {
        Self {
            k_window,
            d_window,
            j_window,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), QuantsigError> {
        require_window("k_window", self.k_window, 1)?;
        require_window("d_window", self.d_window, 1)?;
        require_window("j_window", self.j_window, 1)
    }

    pub(crate) fn column_name(&self) -> String {
        format!("kdj_{}_{}_{}", self.k_window, self.d_window, self.j_window)
    }

    pub fn k_column(&self) -> String {
        format!("{}_k", self.column_name())
    }

    pub fn d_column(&self) -> String {
        format!("{}_d", self.column_name())
    }

    pub fn j_column(&self) -> String {
        format!("{}_j", self.column_name())
    }
}

impl Default for KdjSpec {
    fn default() -> Self {
        Self::new(9, 3, 3)
    }
}

fn rsv(close: &[Option<f64>], lowest: &[Option<f64>], highest: &[Option<f64>]) -> Column {
    (0..close.len())
        .map(|i| {
            let (c, l, h) = (close[i]?, lowest[i]?, highest[i]?);
            let range = h - l;
            (range != 0.0).then(|| 100.0 * (c - l) / range)
        })
        .collect()
}

pub fn calculate_kdj(series: &BarSeries, spec: &KdjSpec) -> Result<BarSeries, QuantsigError> {
    let lowest = rolling_min(&series.prices(PriceField::Low), spec.k_window);
    let highest = rolling_max(&series.prices(PriceField::High), spec.k_window);
    let rsv = rsv(&series.prices(PriceField::Close), &lowest, &highest);

    let k = ewm(&rsv, 1.0 / spec.d_window as f64);
    let d = ewm(&k, 1.0 / spec.j_window as f64);
    let j = zip_with(&k, &d, |k, d| 3.0 * k - 2.0 * d);

    series
        .clone()
        .with_column(spec.k_column(), k)?
        .with_column(spec.d_column(), d)?
        .with_column(spec.j_column(), j)
}

pub fn kdj_signal(
    series: &BarSeries,
    spec: &KdjSpec,
    params: &SignalParams,
) -> Result<BarSeries, QuantsigError> {
    let wrapped = IndicatorSpec::Kdj(*spec);
    let out = ensure(series, &wrapped)?;
    let k = out.require_column(&spec.k_column())?;
    let signals = match params {
        SignalParams::Cross => cross_signals(k, out.require_column(&spec.d_column())?),
        SignalParams::Level {
            overbought,
            oversold,
        } => {
            if oversold >= overbought {
                return Err(QuantsigError::invalid_parameter(
                    "oversold",
                    format!("must be below overbought ({overbought}), got {oversold}"),
                ));
            }
            band_exit_signals(k, *oversold, *overbought)
        }
        _ => return Err(unsupported(&wrapped, params)),
    };
    out.with_column(wrapped.signal_column(params), signals)
}
