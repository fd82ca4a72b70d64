//! RSI (Relative Strength Index) with Wilder smoothing.
//!
//! - First average: simple mean of the first n gains/losses
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss); avg_loss == 0 gives 100.
//! Warmup: first n bars are undefined (n price changes are needed).

use crate::domain::error::QuantsigError;
use crate::domain::indicator::{
    IndicatorSpec, SignalParams, ensure, require_window, unsupported, with_source,
};
use crate::domain::ohlcv::{PriceBar, PriceField};
use crate::domain::series::{BarSeries, Column};
use crate::domain::signal::{Signal, band_exit_signals};

/// Bars compared against when looking for a divergence.
const DIVERGENCE_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiSpec {
    pub window: usize,
    pub source: PriceField,
}

impl RsiSpec {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            source: PriceField::Close,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), QuantsigError> {
        require_window("window", self.window, 1)
    }

    pub(crate) fn column_name(&self) -> String {
        with_source(format!("rsi_{}", self.window), self.source)
    }
}

impl Default for RsiSpec {
    fn default() -> Self {
        Self::new(14)
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

pub(crate) fn wilder_rsi(bars: &[PriceBar], field: PriceField, period: usize) -> Column {
    let mut values = vec![None; bars.len()];
    if period == 0 || bars.len() <= period {
        return values;
    }

    let (mut gains, mut losses) = (Vec::new(), Vec::new());
    for pair in bars.windows(2) {
        let change = pair[1].price(field) - pair[0].price(field);
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    values[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in period + 1..bars.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i - 1]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i - 1]) / period as f64;
        values[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    values
}

pub fn calculate_rsi(series: &BarSeries, spec: &RsiSpec) -> Result<BarSeries, QuantsigError> {
    let values = wilder_rsi(series.bars(), spec.source, spec.window);
    series.clone().with_column(spec.column_name(), values)
}

/// Higher price high with a lower RSI (sell), or lower price low with a
/// higher RSI (buy), against the bar five back. The extremum needs the next
/// bar to confirm, and the final five bars are left undefined.
fn divergence(prices: &[Option<f64>], rsi: &[Option<f64>]) -> Column {
    let n = prices.len();
    let k = DIVERGENCE_LOOKBACK;
    (0..n)
        .map(|i| {
            if i < k || i + k >= n {
                return None;
            }
            let (p, prev, next, back) = (prices[i]?, prices[i - 1]?, prices[i + 1]?, prices[i - k]?);
            let (r, r_back) = (rsi[i]?, rsi[i - k]?);
            let signal = if p > prev && p > next && p > back && r < r_back {
                Signal::Sell
            } else if p < prev && p < next && p < back && r > r_back {
                Signal::Buy
            } else {
                Signal::Hold
            };
            Some(signal.as_f64())
        })
        .collect()
}

pub fn rsi_signal(
    series: &BarSeries,
    spec: &RsiSpec,
    params: &SignalParams,
) -> Result<BarSeries, QuantsigError> {
    let wrapped = IndicatorSpec::Rsi(*spec);
    let out = ensure(series, &wrapped)?;
    let rsi = out.require_column(&spec.column_name())?;
    let signals = match params {
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
            band_exit_signals(rsi, *oversold, *overbought)
        }
        SignalParams::Divergence => divergence(&out.prices(spec.source), rsi),
        _ => return Err(unsupported(&wrapped, params)),
    };
    out.with_column(wrapped.signal_column(params), signals)
}
