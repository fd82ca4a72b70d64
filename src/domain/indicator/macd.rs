//! MACD (Moving Average Convergence Divergence).
//!
//! MACD line = EMA(fast) - EMA(slow)
//! Signal line = EMA(signal) of the MACD line
//! Histogram = MACD line - signal line
//!
//! The EMAs are seeded with the first price, so all three columns are defined
//! from bar 0. Defaults: fast=12, slow=26, signal=9.

use crate::domain::error::QuantsigError;
use crate::domain::indicator::rolling::{ema_span, zip_with};
use crate::domain::indicator::{
    IndicatorSpec, SignalParams, ensure, require_window, unsupported, with_source,
};
use crate::domain::ohlcv::PriceField;
use crate::domain::series::{BarSeries, Column};
use crate::domain::signal::{Signal, cross_signals};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdSpec {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub source: PriceField,
}

impl MacdSpec {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast,
            slow,
            signal,
            source: PriceField::Close,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), QuantsigError> {
        require_window("fast", self.fast, 1)?;
        require_window("slow", self.slow, 1)?;
        require_window("signal", self.signal, 1)?;
        if self.fast >= self.slow {
            return Err(QuantsigError::invalid_parameter(
                "fast",
                format!("must be below slow ({}), got {}", self.slow, self.fast),
            ));
        }
        Ok(())
    }

    pub(crate) fn column_name(&self) -> String {
        with_source(
            format!("macd_{}_{}_{}", self.fast, self.slow, self.signal),
            self.source,
        )
    }

    pub fn line_column(&self) -> String {
        self.column_name()
    }

    pub fn signal_line_column(&self) -> String {
        format!("{}_signal", self.column_name())
    }

    pub fn histogram_column(&self) -> String {
        format!("{}_hist", self.column_name())
    }
}

impl Default for MacdSpec {
    fn default() -> Self {
        Self::new(DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
    }
}

pub fn calculate_macd(series: &BarSeries, spec: &MacdSpec) -> Result<BarSeries, QuantsigError> {
    let prices = series.prices(spec.source);
    let fast = ema_span(&prices, spec.fast);
    let slow = ema_span(&prices, spec.slow);
    let line = zip_with(&fast, &slow, |f, s| f - s);
    let signal = ema_span(&line, spec.signal);
    let hist = zip_with(&line, &signal, |l, s| l - s);

    series
        .clone()
        .with_column(spec.line_column(), line)?
        .with_column(spec.signal_line_column(), signal)?
        .with_column(spec.histogram_column(), hist)
}

/// Local price extremum at `i` (confirmed by bar `i+1`) where the MACD line
/// fails to confirm against bar `i-2`. The last two bars are unconfirmed and
/// stay undefined.
fn divergence(prices: &[Option<f64>], line: &[Option<f64>]) -> Column {
    let n = prices.len();
    (0..n)
        .map(|i| {
            if i < 2 || i + 2 >= n {
                return None;
            }
            let (p, prev, next) = (prices[i]?, prices[i - 1]?, prices[i + 1]?);
            let (m, m_back) = (line[i]?, line[i - 2]?);
            let signal = if p > prev && p > next && m < m_back {
                Signal::Sell
            } else if p < prev && p < next && m > m_back {
                Signal::Buy
            } else {
                Signal::Hold
            };
            Some(signal.as_f64())
        })
        .collect()
}

pub fn macd_signal(
    series: &BarSeries,
    spec: &MacdSpec,
    params: &SignalParams,
) -> Result<BarSeries, QuantsigError> {
    let wrapped = IndicatorSpec::Macd(*spec);
    let out = ensure(series, &wrapped)?;
    let line = out.require_column(&spec.line_column())?;
    let signals = match params {
        SignalParams::Cross => {
            let signal_line = out.require_column(&spec.signal_line_column())?;
            cross_signals(line, signal_line)
        }
        SignalParams::Divergence => divergence(&out.prices(spec.source), line),
        _ => return Err(unsupported(&wrapped, params)),
    };
    out.with_column(wrapped.signal_column(params), signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::series_from_closes;
    use approx::assert_relative_eq;

    fn rising(n: usize) -> BarSeries {
        series_from_closes(&(0..n).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
    }

    #[test]
    fn histogram_equals_line_minus_signal() {
        let out = calculate_macd(&rising(40), &MacdSpec::default()).unwrap();
        for i in 0..40 {
            let line = out.value("macd_12_26_9", i).unwrap();
            let signal = out.value("macd_12_26_9_signal", i).unwrap();
            let hist = out.value("macd_12_26_9_hist", i).unwrap();
            assert!((hist - (line - signal)).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn defined_from_first_bar() {
        let out = calculate_macd(&rising(5), &MacdSpec::default()).unwrap();
        assert_relative_eq!(out.value("macd_12_26_9", 0).unwrap(), 0.0);
        assert!(out.value("macd_12_26_9", 4).unwrap() > 0.0);
    }

    #[test]
    fn constant_prices_never_cross() {
        let series = series_from_closes(&[100.0; 50]);
        let out = macd_signal(&series, &MacdSpec::default(), &SignalParams::Cross).unwrap();
        let signals = out.column("macd_12_26_9_cross_signal").unwrap();
        assert!(signals.iter().all(|s| *s == Some(0.0)));
    }

    #[test]
    fn cross_up_then_down() {
        let mut closes: Vec<f64> = vec![100.0; 10];
        closes.extend((1..=10).map(|i| 100.0 + i as f64));
        closes.extend((1..=15).map(|i| 110.0 - 2.0 * i as f64));
        let out = macd_signal(
            &series_from_closes(&closes),
            &MacdSpec::new(3, 6, 3),
            &SignalParams::Cross,
        )
        .unwrap();
        let signals = out.column("macd_3_6_3_cross_signal").unwrap();
        assert_eq!(signals[10], Some(1.0));
        let sells: Vec<usize> = (0..signals.len())
            .filter(|&i| signals[i] == Some(-1.0))
            .collect();
        assert_eq!(sells, vec![20]);
        assert_eq!(signals.iter().filter(|s| **s == Some(1.0)).count(), 1);
    }

    #[test]
    fn divergence_marks_unconfirmed_top() {
        // macd rises then flattens: peak at bar 6 sits below macd two bars earlier
        let closes = [100.0, 104.0, 108.0, 112.0, 113.0, 113.5, 114.0, 112.0, 111.0, 110.0];
        let series = series_from_closes(&closes);
        let spec = MacdSpec::new(2, 4, 2);
        let out = macd_signal(&series, &spec, &SignalParams::Divergence).unwrap();
        let signals = out.column("macd_2_4_2_divergence_signal").unwrap();
        assert_eq!(signals[0], None);
        assert_eq!(signals[1], None);
        assert_eq!(signals[8], None);
        assert_eq!(signals[9], None);
        assert_eq!(signals[6], Some(-1.0));
    }

    #[test]
    fn fast_must_be_below_slow() {
        assert!(MacdSpec::new(26, 12, 9).validate().is_err());
        assert!(MacdSpec::new(12, 26, 0).validate().is_err());
    }
}
