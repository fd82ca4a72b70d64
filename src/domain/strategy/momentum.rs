//! Momentum strategies: MACD cross, moving-average cross, RSI level.
//!
//! Each passes one indicator signal through unchanged as the strategy signal.

use crate::domain::error::QuantsigError;
use crate::domain::indicator::{
    IndicatorSpec, MacdSpec, MovingAverageSpec, RsiSpec, SignalParams, SignalRequest,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MacdCrossStrategy {
    pub macd: MacdSpec,
}

impl MacdCrossStrategy {
    pub fn new(macd: MacdSpec) -> Result<Self, QuantsigError> {
        macd.validate()?;
        Ok(Self { macd })
    }

    pub(crate) fn signal_request(&self) -> SignalRequest {
        SignalRequest::new(IndicatorSpec::Macd(self.macd), SignalParams::Cross)
    }

    pub fn description(&self) -> String {
        format!(
            "MACD cross (fast={}, slow={}, signal={})",
            self.macd.fast, self.macd.slow, self.macd.signal
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaType {
    Simple,
    Exponential,
}

impl MaType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sma" | "ma" | "simple" => Some(MaType::Simple),
            "ema" | "exponential" => Some(MaType::Exponential),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaCrossStrategy {
    pub fast: usize,
    pub slow: usize,
    pub ma_type: MaType,
}

impl MaCrossStrategy {
    pub fn new(fast: usize, slow: usize, ma_type: MaType) -> Result<Self, QuantsigError> {
        if fast == 0 {
            return Err(QuantsigError::invalid_parameter("fast", "must be >= 1"));
        }
        if fast >= slow {
            return Err(QuantsigError::invalid_parameter(
                "fast",
                format!("must be below slow ({slow}), got {fast}"),
            ));
        }
        Ok(Self {
            fast,
            slow,
            ma_type,
        })
    }

    /// The slow average; the fast one is derived by the cross signal.
    pub fn slow_spec(&self) -> IndicatorSpec {
        let inner = MovingAverageSpec::new(self.slow);
        match self.ma_type {
            MaType::Simple => IndicatorSpec::Sma(inner),
            MaType::Exponential => IndicatorSpec::Ema(inner),
        }
    }

    pub(crate) fn signal_request(&self) -> SignalRequest {
        SignalRequest::new(
            self.slow_spec(),
            SignalParams::MaCross {
                short_window: self.fast,
            },
        )
    }

    pub fn description(&self) -> String {
        let kind = match self.ma_type {
            MaType::Simple => "SMA",
            MaType::Exponential => "EMA",
        };
        format!("MA cross ({kind}, fast={}, slow={})", self.fast, self.slow)
    }
}

/// Buys when RSI climbs out of the oversold band, sells when it drops out of
/// the overbought band.
#[derive(Debug, Clone, PartialEq)]
pub struct RsiLevelStrategy {
    pub rsi: RsiSpec,
    pub overbought: f64,
    pub oversold: f64,
}

impl RsiLevelStrategy {
    pub fn new(rsi: RsiSpec, overbought: f64, oversold: f64) -> Result<Self, QuantsigError> {
        rsi.validate()?;
        if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
            return Err(QuantsigError::invalid_parameter(
                "overbought",
                "thresholds must lie in [0, 100]",
            ));
        }
        if oversold >= overbought {
            return Err(QuantsigError::invalid_parameter(
                "oversold",
                format!("must be below overbought ({overbought}), got {oversold}"),
            ));
        }
        Ok(Self {
            rsi,
            overbought,
            oversold,
        })
    }

    pub(crate) fn signal_request(&self) -> SignalRequest {
        SignalRequest::new(
            IndicatorSpec::Rsi(self.rsi),
            SignalParams::Level {
                overbought: self.overbought,
                oversold: self.oversold,
            },
        )
    }

    pub fn description(&self) -> String {
        format!(
            "RSI level (window={}, overbought={}, oversold={})",
            self.rsi.window, self.overbought, self.oversold
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::series_from_closes;
    use crate::domain::strategy::{SIGNAL_COLUMN, Strategy};

    #[test]
    fn ma_cross_rejects_inverted_windows() {
        assert!(MaCrossStrategy::new(20, 5, MaType::Simple).is_err());
        assert!(MaCrossStrategy::new(0, 5, MaType::Simple).is_err());
        assert!(MaCrossStrategy::new(5, 5, MaType::Exponential).is_err());
    }

    #[test]
    fn ma_cross_constant_prices_never_signal() {
        let series = series_from_closes(&[100.0; 50]);
        let strategy = Strategy::MaCross(MaCrossStrategy::new(5, 20, MaType::Exponential).unwrap());
        let out = strategy.generate_signals(&series).unwrap();
        assert!(out
            .column(SIGNAL_COLUMN)
            .unwrap()
            .iter()
            .all(|s| *s == Some(0.0)));
    }

    #[test]
    fn ema_cross_on_linear_rise_buys_once() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 50.0 / 49.0).collect();
        let strategy = Strategy::MaCross(MaCrossStrategy::new(5, 20, MaType::Exponential).unwrap());
        let out = strategy.generate_signals(&series_from_closes(&closes)).unwrap();
        let signals = out.column(SIGNAL_COLUMN).unwrap();
        assert_eq!(signals[1], Some(1.0));
        assert_eq!(signals.iter().filter(|s| **s == Some(1.0)).count(), 1);
        assert_eq!(signals.iter().filter(|s| **s == Some(-1.0)).count(), 0);
    }

    #[test]
    fn sma_cross_warmup_is_undefined() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let strategy = Strategy::MaCross(MaCrossStrategy::new(5, 20, MaType::Simple).unwrap());
        let out = strategy.generate_signals(&series_from_closes(&closes)).unwrap();
        let signals = out.column(SIGNAL_COLUMN).unwrap();
        assert!(signals[..19].iter().all(Option::is_none));
        assert_eq!(signals[19], Some(0.0));
    }

    #[test]
    fn rsi_thresholds_validated() {
        assert!(RsiLevelStrategy::new(RsiSpec::default(), 30.0, 70.0).is_err());
        assert!(RsiLevelStrategy::new(RsiSpec::default(), 170.0, 30.0).is_err());
        assert!(RsiLevelStrategy::new(RsiSpec::new(0), 70.0, 30.0).is_err());
    }

    #[test]
    fn macd_descriptions_name_parameters() {
        let s = MacdCrossStrategy::new(MacdSpec::default()).unwrap();
        assert_eq!(s.description(), "MACD cross (fast=12, slow=26, signal=9)");
    }
}
