//! Breakout strategies.
//!
//! Breakouts compare today's close against the reference level computed up
//! to the previous bar, so a bar never breaks out of a range that already
//! contains itself.

use crate::domain::error::QuantsigError;
use crate::domain::indicator::rolling::{rolling_max, rolling_min};
use crate::domain::indicator::{
    BollingerSpec, IndicatorSpec, SignalParams, SignalRequest, VolumeSpec, ensure,
};
use crate::domain::ohlcv::PriceField;
use crate::domain::series::{BarSeries, Column};
use crate::domain::signal::Signal;
use crate::domain::strategy::beyond_previous;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerMode {
    /// Close leaves the band.
    Breakout,
    /// Close touches a band and is expected to revert.
    MeanReversion,
}

impl BollingerMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "breakout" => Some(BollingerMode::Breakout),
            "mean_reversion" | "reversion" => Some(BollingerMode::MeanReversion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBreakoutStrategy {
    pub bands: BollingerSpec,
    pub mode: BollingerMode,
}

impl BollingerBreakoutStrategy {
    pub fn new(bands: BollingerSpec, mode: BollingerMode) -> Result<Self, QuantsigError> {
        bands.validate()?;
        Ok(Self { bands, mode })
    }

    pub(crate) fn signal_request(&self) -> SignalRequest {
        let params = match self.mode {
            BollingerMode::Breakout => SignalParams::Breakout,
            BollingerMode::MeanReversion => SignalParams::MeanReversion,
        };
        SignalRequest::new(IndicatorSpec::Bollinger(self.bands), params)
    }

    pub fn description(&self) -> String {
        let mode = match self.mode {
            BollingerMode::Breakout => "breakout",
            BollingerMode::MeanReversion => "mean reversion",
        };
        format!(
            "Bollinger {mode} (window={}, multiplier={})",
            self.bands.window, self.bands.multiplier
        )
    }
}

fn validate_threshold(name: &str, value: f64) -> Result<(), QuantsigError> {
    if !(0.0..1.0).contains(&value) {
        return Err(QuantsigError::invalid_parameter(
            name,
            format!("must be in [0, 1), got {value}"),
        ));
    }
    Ok(())
}

/// Close beyond the recent high/low, widened by `threshold`, for
/// `confirmation` consecutive bars.
#[derive(Debug, Clone, PartialEq)]
pub struct HighLowBreakoutStrategy {
    pub lookback: usize,
    pub threshold: f64,
    pub confirmation: usize,
}

impl HighLowBreakoutStrategy {
    pub fn new(lookback: usize, threshold: f64, confirmation: usize) -> Result<Self, QuantsigError> {
        if lookback == 0 {
            return Err(QuantsigError::invalid_parameter("lookback", "must be >= 1"));
        }
        if confirmation == 0 {
            return Err(QuantsigError::invalid_parameter("confirmation", "must be >= 1"));
        }
        validate_threshold("threshold", threshold)?;
        Ok(Self {
            lookback,
            threshold,
            confirmation,
        })
    }

    fn upper_column(&self) -> String {
        format!("high_low_{}_upper", self.lookback)
    }

    fn lower_column(&self) -> String {
        format!("high_low_{}_lower", self.lookback)
    }

    pub(crate) fn reference_columns(&self) -> Vec<String> {
        vec![self.upper_column(), self.lower_column()]
    }

    /// Add the threshold-adjusted rolling high and low.
    pub(crate) fn prepare_data(&self, series: &BarSeries) -> Result<BarSeries, QuantsigError> {
        let t = self.threshold;
        let upper: Column = rolling_max(&series.prices(PriceField::High), self.lookback)
            .into_iter()
            .map(|v| v.map(|h| h * (1.0 + t)))
            .collect();
        let lower: Column = rolling_min(&series.prices(PriceField::Low), self.lookback)
            .into_iter()
            .map(|v| v.map(|l| l * (1.0 - t)))
            .collect();
        series
            .clone()
            .with_column(self.upper_column(), upper)?
            .with_column(self.lower_column(), lower)
    }

    pub(crate) fn signals(&self, series: &BarSeries) -> Result<Column, QuantsigError> {
        let close = series.prices(PriceField::Close);
        let upper = series.require_column(&self.upper_column())?;
        let lower = series.require_column(&self.lower_column())?;
        let n = close.len();
        let up: Vec<Option<bool>> = (0..n)
            .map(|i| beyond_previous(&close, upper, i, |c, h| c > h))
            .collect();
        let down: Vec<Option<bool>> = (0..n)
            .map(|i| beyond_previous(&close, lower, i, |c, l| c < l))
            .collect();

        let confirmed = |flags: &[Option<bool>], i: usize| {
            i + 1 >= self.confirmation
                && flags[i + 1 - self.confirmation..=i]
                    .iter()
                    .all(|f| *f == Some(true))
        };
        Ok((0..n)
            .map(|i| {
                if up[i].is_none() {
                    return None;
                }
                let signal = if confirmed(&down, i) {
                    Signal::Sell
                } else if confirmed(&up, i) {
                    Signal::Buy
                } else {
                    Signal::Hold
                };
                Some(signal.as_f64())
            })
            .collect())
    }

    pub fn description(&self) -> String {
        format!(
            "High-low breakout (lookback={}, threshold={}%, confirmation={})",
            self.lookback,
            self.threshold * 100.0,
            self.confirmation
        )
    }
}

/// Price breakout gated by a volume surge; exits when the close falls under
/// the recent low.
///
/// The exit uses `price_lookback` for its rolling low as well.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeBreakoutStrategy {
    pub price_lookback: usize,
    pub volume_lookback: usize,
    pub price_threshold: f64,
    pub volume_threshold: f64,
}

impl VolumeBreakoutStrategy {
    pub fn new(
        price_lookback: usize,
        volume_lookback: usize,
        price_threshold: f64,
        volume_threshold: f64,
    ) -> Result<Self, QuantsigError> {
        if price_lookback == 0 {
            return Err(QuantsigError::invalid_parameter("price_lookback", "must be >= 1"));
        }
        if volume_lookback == 0 {
            return Err(QuantsigError::invalid_parameter("volume_lookback", "must be >= 1"));
        }
        validate_threshold("price_threshold", price_threshold)?;
        if !(volume_threshold.is_finite() && volume_threshold > 0.0) {
            return Err(QuantsigError::invalid_parameter(
                "volume_threshold",
                format!("must be positive, got {volume_threshold}"),
            ));
        }
        Ok(Self {
            price_lookback,
            volume_lookback,
            price_threshold,
            volume_threshold,
        })
    }

    fn volume_spec(&self) -> VolumeSpec {
        VolumeSpec::new(self.volume_lookback)
    }

    fn high_column(&self) -> String {
        format!("volume_breakout_{}_high", self.price_lookback)
    }

    fn low_column(&self) -> String {
        format!("volume_breakout_{}_low", self.price_lookback)
    }

    pub(crate) fn reference_columns(&self) -> Vec<String> {
        vec![
            self.high_column(),
            self.low_column(),
            self.volume_spec().ma_column(),
        ]
    }

    pub(crate) fn prepare_data(&self, series: &BarSeries) -> Result<BarSeries, QuantsigError> {
        let t = self.price_threshold;
        let high: Column = rolling_max(&series.prices(PriceField::High), self.price_lookback)
            .into_iter()
            .map(|v| v.map(|h| h * (1.0 + t)))
            .collect();
        let low = rolling_min(&series.prices(PriceField::Low), self.price_lookback);
        ensure(series, &IndicatorSpec::Volume(self.volume_spec()))?
            .with_column(self.high_column(), high)?
            .with_column(self.low_column(), low)
    }

    pub(crate) fn signals(&self, series: &BarSeries) -> Result<Column, QuantsigError> {
        let close = series.prices(PriceField::Close);
        let volume = series.volumes();
        let high = series.require_column(&self.high_column())?;
        let low = series.require_column(&self.low_column())?;
        let volume_ma = series.require_column(&self.volume_spec().ma_column())?;
        let vt = self.volume_threshold;
        Ok((0..close.len())
            .map(|i| {
                let price_up = beyond_previous(&close, high, i, |c, h| c > h)?;
                let volume_up = beyond_previous(&volume, volume_ma, i, |v, m| v > m * vt)?;
                let breakdown = beyond_previous(&close, low, i, |c, l| c < l)?;
                let signal = if breakdown {
                    Signal::Sell
                } else if price_up && volume_up {
                    Signal::Buy
                } else {
                    Signal::Hold
                };
                Some(signal.as_f64())
            })
            .collect())
    }

    pub fn description(&self) -> String {
        format!(
            "Volume breakout (price lookback={}, price threshold={}%, volume lookback={}, volume threshold={}x)",
            self.price_lookback,
            self.price_threshold * 100.0,
            self.volume_lookback,
            self.volume_threshold
        )
    }
}
