//! Backtest simulator.
//!
//! The signal on bar `i - 1` is filled at bar `i`'s close, so no decision
//! uses a price it could not have seen. Equity is recorded on every bar,
//! starting with the untouched initial capital on bar 0.

use tracing::{debug, info, warn};

use crate::domain::error::QuantsigError;
use crate::domain::metrics::{Metrics, TradeStats};
use crate::domain::portfolio::{EntryResult, EquityPoint, Portfolio};
use crate::domain::position::Trade;
use crate::domain::series::BarSeries;
use crate::domain::signal::Signal;
use crate::domain::strategy::{SIGNAL_COLUMN, Strategy};
use crate::ports::data_port::MarketDataProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fraction of cash committed on entry, `(0, 1]`.
    pub position_size: f64,
    /// Fee as a fraction of notional, charged on entry and exit.
    pub commission: f64,
    pub risk_free_rate: f64,
    /// Quantity bought per level by the grid simulator.
    pub shares_per_grid: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            position_size: 1.0,
            commission: 0.0,
            risk_free_rate: 0.02,
            shares_per_grid: 1.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), QuantsigError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(QuantsigError::invalid_parameter(
                "initial_capital",
                format!("must be positive, got {}", self.initial_capital),
            ));
        }
        if !(self.position_size > 0.0 && self.position_size <= 1.0) {
            return Err(QuantsigError::invalid_parameter(
                "position_size",
                format!("must be in (0, 1], got {}", self.position_size),
            ));
        }
        if !(0.0..1.0).contains(&self.commission) {
            return Err(QuantsigError::invalid_parameter(
                "commission",
                format!("must be in [0, 1), got {}", self.commission),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(QuantsigError::invalid_parameter(
                "risk_free_rate",
                "must be finite",
            ));
        }
        if !(self.shares_per_grid.is_finite() && self.shares_per_grid > 0.0) {
            return Err(QuantsigError::invalid_parameter(
                "shares_per_grid",
                format!("must be positive, got {}", self.shares_per_grid),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: String,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub annual_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub stats: TradeStats,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Quantity still held after the last bar.
    pub open_quantity: f64,
}

impl BacktestResult {
    fn from_portfolio(portfolio: Portfolio, strategy: &str, config: &BacktestConfig) -> Self {
        let metrics = Metrics::compute(
            config.initial_capital,
            &portfolio.equity_curve,
            config.risk_free_rate,
        );
        let open_quantity = portfolio.position().map(|p| p.quantity).unwrap_or(0.0);
        BacktestResult {
            stats: TradeStats::from_trades(&portfolio.trades),
            symbol: portfolio.symbol,
            strategy: strategy.to_string(),
            initial_capital: config.initial_capital,
            final_equity: metrics.final_equity,
            total_return_pct: metrics.total_return_pct,
            annual_return_pct: metrics.annual_return_pct,
            max_drawdown_pct: metrics.max_drawdown_pct,
            sharpe_ratio: metrics.sharpe_ratio,
            trades: portfolio.trades,
            equity_curve: portfolio.equity_curve,
            open_quantity,
        }
    }
}

/// How entries are sized.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Sizing {
    /// Commit `position_size` of cash, fee included, into the single slot.
    CashFraction,
    /// Fixed quantity per grid level.
    PerLevel(f64),
}

fn require_bars(series: &BarSeries) -> Result<(), QuantsigError> {
    match series.len() {
        0 => Err(QuantsigError::NoData {
            symbol: series.symbol().to_string(),
        }),
        1 => Err(QuantsigError::MalformedSeries {
            reason: format!("{} has 1 bar, backtest needs at least 2", series.symbol()),
        }),
        _ => Ok(()),
    }
}

fn replay(
    signaled: &BarSeries,
    config: &BacktestConfig,
    slots: usize,
    sizing: Sizing,
) -> Result<Portfolio, QuantsigError> {
    let signals = signaled.require_column(SIGNAL_COLUMN)?;
    let bars = signaled.bars();
    let mut portfolio = Portfolio::new(signaled.symbol(), config.initial_capital, slots);
    portfolio.record_equity(bars[0].timestamp, bars[0].close);

    for i in 1..bars.len() {
        let bar = &bars[i];
        match signals[i - 1].and_then(Signal::from_value) {
            Some(Signal::Buy) => {
                let quantity = match sizing {
                    Sizing::CashFraction => {
                        portfolio.cash * config.position_size
                            / (bar.close * (1.0 + config.commission))
                    }
                    Sizing::PerLevel(quantity) => quantity,
                };
                match portfolio.open_lot(bar.timestamp, bar.close, quantity, config.commission) {
                    EntryResult::InsufficientCapital => debug!(
                        symbol = signaled.symbol(),
                        bar = i,
                        price = bar.close,
                        cash = portfolio.cash,
                        "buy skipped: insufficient capital"
                    ),
                    EntryResult::NoFreeSlot | EntryResult::Filled { .. } => {}
                }
            }
            Some(Signal::Sell) => {
                portfolio.close_lowest(bar.timestamp, bar.close, config.commission);
            }
            Some(Signal::Hold) | None => {}
        }
        portfolio.record_equity(bar.timestamp, bar.close);
    }
    Ok(portfolio)
}

/// Replay a series that already carries a `signal` column with a single
/// all-in/all-out position.
pub fn simulate(
    signaled: &BarSeries,
    strategy: &str,
    config: &BacktestConfig,
) -> Result<BacktestResult, QuantsigError> {
    config.validate()?;
    require_bars(signaled)?;
    let portfolio = replay(signaled, config, 1, Sizing::CashFraction)?;
    Ok(BacktestResult::from_portfolio(portfolio, strategy, config))
}

/// Replay with one inventory slot per grid level, buying
/// `shares_per_grid` per fill.
pub fn simulate_grid(
    signaled: &BarSeries,
    levels: usize,
    strategy: &str,
    config: &BacktestConfig,
) -> Result<BacktestResult, QuantsigError> {
    config.validate()?;
    require_bars(signaled)?;
    if levels == 0 {
        return Err(QuantsigError::InvalidGrid {
            reason: "grid_num must be greater than 0".into(),
        });
    }
    let portfolio = replay(
        signaled,
        config,
        levels,
        Sizing::PerLevel(config.shares_per_grid),
    )?;
    Ok(BacktestResult::from_portfolio(portfolio, strategy, config))
}

/// Generate `strategy`'s signals over `series` and replay them. Grid
/// strategies use the per-level simulator.
pub fn run_backtest(
    series: &BarSeries,
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, QuantsigError> {
    config.validate()?;
    require_bars(series)?;
    info!(
        symbol = series.symbol(),
        strategy = strategy.name(),
        bars = series.len(),
        "backtest started"
    );

    let signaled = strategy.generate_signals(series)?;
    let result = match strategy.grid_levels() {
        Some(levels) => simulate_grid(&signaled, levels, strategy.name(), config)?,
        None => simulate(&signaled, strategy.name(), config)?,
    };

    info!(
        symbol = series.symbol(),
        trades = result.trades.len(),
        final_equity = result.final_equity,
        total_return_pct = result.total_return_pct,
        "backtest finished"
    );
    Ok(result)
}

/// One symbol's outcome in a batch.
#[derive(Debug)]
pub struct SymbolBacktest {
    pub symbol: String,
    pub result: Result<BacktestResult, QuantsigError>,
}

/// Backtest every symbol independently. A failing symbol is tagged and
/// logged; it never aborts the others.
pub fn batch_backtest(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    timeframe: &str,
    limit: usize,
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Vec<SymbolBacktest> {
    symbols
        .iter()
        .map(|symbol| {
            let result = provider
                .get_bars(symbol, timeframe, limit)
                .and_then(|series| run_backtest(&series, strategy, config));
            if let Err(e) = &result {
                warn!(symbol = %symbol, error = %e, "backtest failed");
            }
            SymbolBacktest {
                symbol: symbol.clone(),
                result,
            }
        })
        .collect()
}
