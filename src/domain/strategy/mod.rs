//! Trading strategies: indicator dependencies plus a rule that folds them
//! into one unified `signal` column.
//!
//! Each variant declares the indicators and raw signals it needs
//! ([`Strategy::signal_requests`]) so they are computed once by
//! [`prepare_data`](Strategy::prepare_data). [`generate_signals`](Strategy::generate_signals)
//! then writes [`SIGNAL_COLUMN`], which the backtester and risk manager read
//! regardless of variant.

pub mod breakout;
pub mod grid;
pub mod momentum;
pub mod registry;

use tracing::debug;

use crate::domain::error::QuantsigError;
use crate::domain::indicator::{SignalRequest, signals_all};
use crate::domain::series::BarSeries;

pub use breakout::{
    BollingerBreakoutStrategy, BollingerMode, HighLowBreakoutStrategy, VolumeBreakoutStrategy,
};
pub use grid::{DynamicGridStrategy, GridCenter, GridStrategy};
pub use momentum::{MaCrossStrategy, MaType, MacdCrossStrategy, RsiLevelStrategy};
pub use registry::build_strategy;

/// Name of the unified strategy signal column.
pub const SIGNAL_COLUMN: &str = "signal";

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    MacdCross(MacdCrossStrategy),
    MaCross(MaCrossStrategy),
    RsiLevel(RsiLevelStrategy),
    BollingerBreakout(BollingerBreakoutStrategy),
    HighLowBreakout(HighLowBreakoutStrategy),
    VolumeBreakout(VolumeBreakoutStrategy),
    Grid(GridStrategy),
    DynamicGrid(DynamicGridStrategy),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::MacdCross(_) => "macd_cross",
            Strategy::MaCross(_) => "ma_cross",
            Strategy::RsiLevel(_) => "rsi",
            Strategy::BollingerBreakout(_) => "breakout/bollinger",
            Strategy::HighLowBreakout(_) => "breakout/high_low",
            Strategy::VolumeBreakout(_) => "breakout/volume",
            Strategy::Grid(_) => "grid/fixed",
            Strategy::DynamicGrid(_) => "grid/dynamic",
        }
    }

    /// Indicators and raw signals computed by [`Strategy::prepare_data`].
    pub fn signal_requests(&self) -> Vec<SignalRequest> {
        match self {
            Strategy::MacdCross(s) => vec![s.signal_request()],
            Strategy::MaCross(s) => vec![s.signal_request()],
            Strategy::RsiLevel(s) => vec![s.signal_request()],
            Strategy::BollingerBreakout(s) => vec![s.signal_request()],
            Strategy::HighLowBreakout(_)
            | Strategy::VolumeBreakout(_)
            | Strategy::Grid(_)
            | Strategy::DynamicGrid(_) => Vec::new(),
        }
    }

    /// Add indicator columns, raw signal columns, and any strategy-specific
    /// reference columns.
    pub fn prepare_data(&self, series: &BarSeries) -> Result<BarSeries, QuantsigError> {
        let out = signals_all(series, &self.signal_requests())?;
        match self {
            Strategy::HighLowBreakout(s) => s.prepare_data(&out),
            Strategy::VolumeBreakout(s) => s.prepare_data(&out),
            Strategy::Grid(s) => s.prepare_data(&out),
            Strategy::DynamicGrid(s) => s.prepare_data(&out),
            _ => Ok(out),
        }
    }

    /// Add the unified [`SIGNAL_COLUMN`], preparing the data first when its
    /// inputs are missing.
    pub fn generate_signals(&self, series: &BarSeries) -> Result<BarSeries, QuantsigError> {
        let prepared = if self.is_prepared(series) {
            series.clone()
        } else {
            self.prepare_data(series)?
        };
        let signals = match self {
            Strategy::MacdCross(_)
            | Strategy::MaCross(_)
            | Strategy::RsiLevel(_)
            | Strategy::BollingerBreakout(_) => {
                let column = self.signal_requests()[0].column();
                prepared.require_column(&column)?.to_vec()
            }
            Strategy::HighLowBreakout(s) => s.signals(&prepared)?,
            Strategy::VolumeBreakout(s) => s.signals(&prepared)?,
            Strategy::Grid(_) | Strategy::DynamicGrid(_) => grid::position_signals(
                prepared.require_column(grid::GRID_POSITION_COLUMN)?,
            ),
        };
        let nonzero = signals.iter().flatten().filter(|s| **s != 0.0).count();
        debug!(
            symbol = series.symbol(),
            strategy = self.name(),
            bars = series.len(),
            nonzero,
            "signals generated"
        );
        prepared.with_column(SIGNAL_COLUMN, signals)
    }

    fn is_prepared(&self, series: &BarSeries) -> bool {
        let requests_done = self
            .signal_requests()
            .iter()
            .all(|r| series.has_column(&r.column()));
        let extra_done = match self {
            Strategy::HighLowBreakout(s) => s.reference_columns().iter().all(|c| series.has_column(c)),
            Strategy::VolumeBreakout(s) => s.reference_columns().iter().all(|c| series.has_column(c)),
            Strategy::Grid(_) | Strategy::DynamicGrid(_) => {
                series.has_column(grid::GRID_POSITION_COLUMN)
            }
            _ => true,
        };
        requests_done && extra_done
    }

    /// Per-level inventory size for grid variants; `None` for single-position
    /// strategies.
    pub fn grid_levels(&self) -> Option<usize> {
        match self {
            Strategy::Grid(s) => Some(s.grid_num()),
            Strategy::DynamicGrid(s) => Some(s.grid_num),
            _ => None,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Strategy::MacdCross(s) => s.description(),
            Strategy::MaCross(s) => s.description(),
            Strategy::RsiLevel(s) => s.description(),
            Strategy::BollingerBreakout(s) => s.description(),
            Strategy::HighLowBreakout(s) => s.description(),
            Strategy::VolumeBreakout(s) => s.description(),
            Strategy::Grid(s) => s.description(),
            Strategy::DynamicGrid(s) => s.description(),
        }
    }
}

/// `true` at `i` when `reference[i-1]` is defined and `pred(value[i], reference[i-1])` holds.
pub(crate) fn beyond_previous(
    values: &[Option<f64>],
    reference: &[Option<f64>],
    i: usize,
    pred: impl Fn(f64, f64) -> bool,
) -> Option<bool> {
    if i == 0 {
        return None;
    }
    Some(pred(values[i]?, reference[i - 1]?))
}
