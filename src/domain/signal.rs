//! Discrete trading signals and edge-detection helpers.
//!
//! Signal columns are stored as `Option<f64>` with values -1/0/+1. A signal is
//! `None` only where the inputs at the current bar are undefined, i.e. inside
//! the indicator's warm-up. Once the inputs are defined the detector has been
//! evaluated: the first such bar has no prior state to transition from, so it
//! reports `Hold` rather than no value. Backtests and live decisions treat
//! both the same way (no trade); only analysis output tells them apart.
//!
//! All detectors fire on the transition bar only, never while a condition
//! persists:
//! - cross up at i: `a[i] > b[i] && a[i-1] <= b[i-1]`
//! - cross down at i: `a[i] < b[i] && a[i-1] >= b[i-1]`

use crate::domain::series::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Sell = -1,
    Hold = 0,
    Buy = 1,
}

impl Signal {
    pub fn from_value(value: f64) -> Option<Self> {
        if value > 0.5 {
            Some(Signal::Buy)
        } else if value < -0.5 {
            Some(Signal::Sell)
        } else if value.is_finite() {
            Some(Signal::Hold)
        } else {
            None
        }
    }

    pub fn as_f64(self) -> f64 {
        self as i8 as f64
    }

    pub fn label(self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }
}

fn pair(a: &[Option<f64>], b: &[Option<f64>], i: usize) -> Option<(f64, f64)> {
    Some((a.get(i).copied().flatten()?, b.get(i).copied().flatten()?))
}

/// Edge-triggered cross of `fast` over `slow`.
pub fn cross_signals(fast: &[Option<f64>], slow: &[Option<f64>]) -> Column {
    (0..fast.len())
        .map(|i| {
            let (f, s) = pair(fast, slow, i)?;
            let prev = if i == 0 { None } else { pair(fast, slow, i - 1) };
            let signal = match prev {
                Some((pf, ps)) if f > s && pf <= ps => Signal::Buy,
                Some((pf, ps)) if f < s && pf >= ps => Signal::Sell,
                _ => Signal::Hold,
            };
            Some(signal.as_f64())
        })
        .collect()
}

/// Band-exit signals: Buy when `values` rises out of the lower band
/// (`v > lower`, previous `<= lower`), Sell when it falls out of the upper band
/// (`v < upper`, previous `>= upper`).
pub fn band_exit_signals(values: &[Option<f64>], lower: f64, upper: f64) -> Column {
    (0..values.len())
        .map(|i| {
            let v = values[i]?;
            let prev = if i == 0 { None } else { values[i - 1] };
            let mut signal = Signal::Hold;
            if let Some(p) = prev {
                if v > lower && p <= lower {
                    signal = Signal::Buy;
                }
                if v < upper && p >= upper {
                    signal = Signal::Sell;
                }
            }
            Some(signal.as_f64())
        })
        .collect()
}

/// Band-touch signals: Sell on the bar `price` first reaches `upper`
/// (`p >= upper`, previously below), Buy on the bar it first reaches `lower`.
pub fn band_touch_signals(
    price: &[Option<f64>],
    upper: &[Option<f64>],
    lower: &[Option<f64>],
) -> Column {
    (0..price.len())
        .map(|i| {
            let (p, u) = pair(price, upper, i)?;
            let l = lower.get(i).copied().flatten()?;
            let prev = if i == 0 {
                None
            } else {
                match (pair(price, upper, i - 1), lower.get(i - 1).copied().flatten()) {
                    (Some((pp, pu)), Some(pl)) => Some((pp, pu, pl)),
                    _ => None,
                }
            };
            let mut signal = Signal::Hold;
            if let Some((pp, pu, pl)) = prev {
                if p >= u && pp < pu {
                    signal = Signal::Sell;
                }
                if p <= l && pp > pl {
                    signal = Signal::Buy;
                }
            }
            Some(signal.as_f64())
        })
        .collect()
}
