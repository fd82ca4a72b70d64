//! Volume analysis.
//!
//! - `_ma`: rolling mean volume over n bars
//! - `_ratio`: volume / rolling mean
//! - `_change`: percent change from the previous bar
//! - `_buy` / `_sell`: bar volume split by candle colour (close >= open buys)
//! - `_buy_sell_ratio`: rolling buy volume / rolling sell volume

use crate::domain::error::QuantsigError;
use crate::domain::indicator::rolling::{ratio, rolling_mean, rolling_sum};
use crate::domain::indicator::{IndicatorSpec, SignalParams, ensure, require_window, unsupported};
use crate::domain::ohlcv::PriceBar;
use crate::domain::series::{BarSeries, Column};
use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSpec {
    pub window: usize,
}

impl VolumeSpec {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub(crate) fn validate(&self) -> Result<(), QuantsigError> {
        require_window("window", self.window, 1)
    }

    pub(crate) fn column_name(&self) -> String {
        format!("volume_{}", self.window)
    }

    pub fn ma_column(&self) -> String {
        format!("{}_ma", self.column_name())
    }

    pub fn ratio_column(&self) -> String {
        format!("{}_ratio", self.column_name())
    }
}

impl Default for VolumeSpec {
    fn default() -> Self {
        Self::new(20)
    }
}

fn pct_change(values: &[Option<f64>]) -> Column {
    (0..values.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            let (v, prev) = (values[i]?, values[i - 1]?);
            (prev != 0.0).then(|| (v / prev - 1.0) * 100.0)
        })
        .collect()
}

fn split_volume(bars: &[PriceBar]) -> (Column, Column) {
    bars.iter()
        .map(|b| {
            if b.is_up() {
                (Some(b.volume), Some(0.0))
            } else {
                (Some(0.0), Some(b.volume))
            }
        })
        .unzip()
}

pub fn calculate_volume(series: &BarSeries, spec: &VolumeSpec) -> Result<BarSeries, QuantsigError> {
    let volume = series.volumes();
    let ma = rolling_mean(&volume, spec.window);
    let vol_ratio = ratio(&volume, &ma);
    let change = pct_change(&volume);
    let (buy, sell) = split_volume(series.bars());
    let buy_sell = ratio(
        &rolling_sum(&buy, spec.window),
        &rolling_sum(&sell, spec.window),
    );

    let base = spec.column_name();
    series
        .clone()
        .with_column(spec.ma_column(), ma)?
        .with_column(spec.ratio_column(), vol_ratio)?
        .with_column(format!("{base}_change"), change)?
        .with_column(format!("{base}_buy"), buy)?
        .with_column(format!("{base}_sell"), sell)?
        .with_column(format!("{base}_buy_sell_ratio"), buy_sell)
}

/// The volume ratio rising through `multiple` marks a surge; an up candle
/// buys, a down candle sells, a doji holds.
fn surge(bars: &[PriceBar], vol_ratio: &[Option<f64>], multiple: f64) -> Column {
    (0..bars.len())
        .map(|i| {
            let r = vol_ratio[i]?;
            let prev = if i == 0 { None } else { vol_ratio[i - 1] };
            let crossed = matches!(prev, Some(p) if r > multiple && p <= multiple);
            let bar = &bars[i];
            let signal = if !crossed {
                Signal::Hold
            } else if bar.close > bar.open {
                Signal::Buy
            } else if bar.close < bar.open {
                Signal::Sell
            } else {
                Signal::Hold
            };
            Some(signal.as_f64())
        })
        .collect()
}

/// Price moving on two consecutive volume declines: a rise sells, a fall buys.
fn divergence(bars: &[PriceBar]) -> Column {
    (0..bars.len())
        .map(|i| {
            if i < 2 {
                return None;
            }
            let (b, b1, b2) = (&bars[i], &bars[i - 1], &bars[i - 2]);
            let fading = b.volume < b1.volume && b1.volume < b2.volume;
            let signal = if fading && b.close > b1.close {
                Signal::Sell
            } else if fading && b.close < b1.close {
                Signal::Buy
            } else {
                Signal::Hold
            };
            Some(signal.as_f64())
        })
        .collect()
}

pub fn volume_signal(
    series: &BarSeries,
    spec: &VolumeSpec,
    params: &SignalParams,
) -> Result<BarSeries, QuantsigError> {
    let wrapped = IndicatorSpec::Volume(*spec);
    let out = ensure(series, &wrapped)?;
    let signals = match params {
        SignalParams::Surge { multiple } => {
            if !(multiple.is_finite() && *multiple > 0.0) {
                return Err(QuantsigError::invalid_parameter(
                    "surge",
                    format!("must be positive, got {multiple}"),
                ));
            }
            surge(out.bars(), out.require_column(&spec.ratio_column())?, *multiple)
        }
        SignalParams::Divergence => divergence(out.bars()),
        _ => return Err(unsupported(&wrapped, params)),
    };
    out.with_column(wrapped.signal_column(params), signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::bar;
    use approx::assert_relative_eq;

    fn ocv_series(rows: &[(f64, f64, f64)]) -> BarSeries {
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(open, close, volume))| {
                bar(i, open, open.max(close), open.min(close), close, volume)
            })
            .collect();
        BarSeries::new("TEST", bars).unwrap()
    }

    #[test]
    fn columns_for_split_and_ratio() {
        let series = ocv_series(&[(10.0, 11.0, 100.0), (11.0, 10.0, 300.0), (10.0, 10.0, 200.0)]);
        let out = calculate_volume(&series, &VolumeSpec::new(2)).unwrap();
        assert_eq!(out.value("volume_2_ma", 0), None);
        assert_relative_eq!(out.value("volume_2_ma", 1).unwrap(), 200.0);
        assert_relative_eq!(out.value("volume_2_ratio", 1).unwrap(), 1.5);
        assert_relative_eq!(out.value("volume_2_change", 1).unwrap(), 200.0);
        assert_eq!(out.value("volume_2_buy", 1), Some(0.0));
        assert_eq!(out.value("volume_2_sell", 1), Some(300.0));
        // doji counts as buying
        assert_eq!(out.value("volume_2_buy", 2), Some(200.0));
        // rolling buy 100 / sell 300
        assert_relative_eq!(out.value("volume_2_buy_sell_ratio", 1).unwrap(), 1.0 / 3.0);
        // rolling buy 200 / sell 300
        assert_eq!(out.value("volume_2_buy_sell_ratio", 2), Some(200.0 / 300.0));
    }

    #[test]
    fn surge_fires_on_crossing_bar_only() {
        let series = ocv_series(&[
            (10.0, 10.0, 100.0),
            (10.0, 10.0, 100.0),
            (10.0, 11.0, 400.0),
            (11.0, 12.0, 600.0),
            (12.0, 11.0, 100.0),
        ]);
        let out = volume_signal(
            &series,
            &VolumeSpec::new(2),
            &SignalParams::Surge { multiple: 1.5 },
        )
        .unwrap();
        let signals = out.column("volume_2_surge_signal").unwrap();
        // ratios: -, 1.0, 1.6, 1.2, 0.29
        assert_eq!(signals, &[None, Some(0.0), Some(1.0), Some(0.0), Some(0.0)]);
    }

    #[test]
    fn divergence_on_fading_volume() {
        let series = ocv_series(&[
            (10.0, 10.0, 300.0),
            (10.0, 11.0, 200.0),
            (11.0, 12.0, 100.0),
            (12.0, 11.0, 50.0),
        ]);
        let out = volume_signal(&series, &VolumeSpec::new(2), &SignalParams::Divergence).unwrap();
        let signals = out.column("volume_2_divergence_signal").unwrap();
        assert_eq!(signals, &[None, None, Some(-1.0), Some(1.0)]);
    }
}
