//! Grid trading strategies.
//!
//! A grid splits `[lower, upper]` into `grid_num` equal bands. The grid
//! position of a price is the index of the band containing it, clamped to
//! `0..grid_num`. Moving up a band sells (take profit), moving down buys.

use crate::domain::error::QuantsigError;
use crate::domain::indicator::rolling::{rolling_mean, rolling_std};
use crate::domain::ohlcv::PriceField;
use crate::domain::series::{BarSeries, Column};
use crate::domain::signal::Signal;

pub const GRID_POSITION_COLUMN: &str = "grid_position";
pub const GRID_UPPER_COLUMN: &str = "grid_upper";
pub const GRID_LOWER_COLUMN: &str = "grid_lower";

/// Equidistant level prices from `lower` to `upper` inclusive.
fn level_prices(lower: f64, upper: f64, grid_num: usize) -> Vec<f64> {
    let interval = (upper - lower) / grid_num as f64;
    (0..=grid_num).map(|k| lower + k as f64 * interval).collect()
}

fn band_index(levels: &[f64], price: f64) -> usize {
    let top = levels.len() - 2;
    if price >= levels[levels.len() - 1] {
        return top;
    }
    levels
        .windows(2)
        .position(|w| w[0] <= price && price < w[1])
        .unwrap_or(0)
}

/// Buy on a move down a band, sell on a move up.
pub(crate) fn position_signals(positions: &[Option<f64>]) -> Column {
    (0..positions.len())
        .map(|i| {
            let pos = positions[i]?;
            let prev = if i == 0 { None } else { positions[i - 1] };
            let signal = match prev {
                Some(p) if pos > p => Signal::Sell,
                Some(p) if pos < p => Signal::Buy,
                _ => Signal::Hold,
            };
            Some(signal.as_f64())
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridStrategy {
    upper: f64,
    lower: f64,
    grid_num: usize,
    levels: Vec<f64>,
}

impl GridStrategy {
    /// Fails with [`QuantsigError::InvalidGrid`] unless `upper > lower` and
    /// `grid_num > 0`.
    pub fn new(upper: f64, lower: f64, grid_num: usize) -> Result<Self, QuantsigError> {
        if !(upper.is_finite() && lower.is_finite()) {
            return Err(QuantsigError::InvalidGrid {
                reason: "grid bounds must be finite".into(),
            });
        }
        if upper <= lower {
            return Err(QuantsigError::InvalidGrid {
                reason: format!("upper price {upper} must exceed lower price {lower}"),
            });
        }
        if grid_num == 0 {
            return Err(QuantsigError::InvalidGrid {
                reason: "grid_num must be greater than 0".into(),
            });
        }
        Ok(Self {
            upper,
            lower,
            grid_num,
            levels: level_prices(lower, upper, grid_num),
        })
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn grid_num(&self) -> usize {
        self.grid_num
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn position(&self, price: f64) -> usize {
        band_index(&self.levels, price)
    }

    pub(crate) fn prepare_data(&self, series: &BarSeries) -> Result<BarSeries, QuantsigError> {
        let positions = series
            .bars()
            .iter()
            .map(|b| Some(self.position(b.close) as f64))
            .collect();
        series.clone().with_column(GRID_POSITION_COLUMN, positions)
    }

    pub fn description(&self) -> String {
        format!(
            "Fixed grid (upper={}, lower={}, grid_num={})",
            self.upper, self.lower, self.grid_num
        )
    }
}

/// Where a dynamic grid is centred each bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridCenter {
    /// Rolling mean over the volatility window.
    RollingMean,
    Fixed(f64),
}

/// Grid whose band is `center +/- multiplier * rolling_std(window)`,
/// rebuilt every bar. Bars before the window fills, or with zero volatility,
/// have no position.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicGridStrategy {
    pub window: usize,
    pub grid_num: usize,
    pub multiplier: f64,
    pub center: GridCenter,
}

impl DynamicGridStrategy {
    pub fn new(
        window: usize,
        grid_num: usize,
        multiplier: f64,
        center: GridCenter,
    ) -> Result<Self, QuantsigError> {
        if window < 2 {
            return Err(QuantsigError::invalid_parameter(
                "volatility_window",
                format!("must be >= 2, got {window}"),
            ));
        }
        if grid_num == 0 {
            return Err(QuantsigError::InvalidGrid {
                reason: "grid_num must be greater than 0".into(),
            });
        }
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(QuantsigError::invalid_parameter(
                "volatility_multiplier",
                format!("must be positive, got {multiplier}"),
            ));
        }
        if let GridCenter::Fixed(price) = center {
            if !(price.is_finite() && price > 0.0) {
                return Err(QuantsigError::InvalidGrid {
                    reason: format!("center price must be positive, got {price}"),
                });
            }
        }
        Ok(Self {
            window,
            grid_num,
            multiplier,
            center,
        })
    }

    pub(crate) fn prepare_data(&self, series: &BarSeries) -> Result<BarSeries, QuantsigError> {
        let prices = series.prices(PriceField::Close);
        let mean = rolling_mean(&prices, self.window);
        let std = rolling_std(&prices, self.window);
        let n = prices.len();
        let (mut upper, mut lower, mut positions) = (vec![None; n], vec![None; n], vec![None; n]);

        for i in 0..n {
            let (Some(price), Some(m), Some(s)) = (prices[i], mean[i], std[i]) else {
                continue;
            };
            let center = match self.center {
                GridCenter::RollingMean => m,
                GridCenter::Fixed(c) => c,
            };
            let (hi, lo) = (center + s * self.multiplier, center - s * self.multiplier);
            upper[i] = Some(hi);
            lower[i] = Some(lo);
            if hi > lo {
                let levels = level_prices(lo, hi, self.grid_num);
                positions[i] = Some(band_index(&levels, price) as f64);
            }
        }

        series
            .clone()
            .with_column(GRID_UPPER_COLUMN, upper)?
            .with_column(GRID_LOWER_COLUMN, lower)?
            .with_column(GRID_POSITION_COLUMN, positions)
    }

    pub fn description(&self) -> String {
        let center = match self.center {
            GridCenter::RollingMean => "rolling mean".to_string(),
            GridCenter::Fixed(c) => c.to_string(),
        };
        format!(
            "Dynamic grid (center={center}, volatility window={}, multiplier={}, grid_num={})",
            self.window, self.multiplier, self.grid_num
        )
    }
}
