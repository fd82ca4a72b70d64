//! Performance metrics and trade statistics.
//!
//! Returns and drawdowns are expressed in percent. Annualisation assumes 252
//! trading bars per year regardless of the bar timeframe.

use super::portfolio::EquityPoint;
use super::position::{Trade, TradeSide};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub annual_return_pct: f64,
    /// Deepest peak-to-trough fall, `<= 0`.
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
}

impl Metrics {
    pub fn compute(initial_capital: f64, equity_curve: &[EquityPoint], risk_free_rate: f64) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return_pct = if initial_capital > 0.0 {
            (final_equity / initial_capital - 1.0) * 100.0
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annual_return_pct = if years > 0.0 {
            total_return_pct / years
        } else {
            0.0
        };

        Metrics {
            final_equity,
            total_return_pct,
            annual_return_pct,
            max_drawdown_pct: compute_drawdown(equity_curve),
            sharpe_ratio: compute_sharpe(equity_curve, annual_return_pct, risk_free_rate),
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            max_dd = max_dd.min((point.equity - peak) / peak);
        }
    }
    max_dd * 100.0
}

/// Sample standard deviation of bar-to-bar equity returns.
fn returns_std(equity_curve: &[EquityPoint]) -> Option<f64> {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0)
        .map(|w| w[1].equity / w[0].equity - 1.0)
        .collect();
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

fn compute_sharpe(equity_curve: &[EquityPoint], annual_return_pct: f64, risk_free_rate: f64) -> f64 {
    match returns_std(equity_curve) {
        Some(std) if std > 0.0 => {
            (annual_return_pct / 100.0 - risk_free_rate) / (std * TRADING_DAYS_PER_YEAR.sqrt())
        }
        _ => 0.0,
    }
}

/// Round-trip statistics. Only sells close a trade; a sell with zero or
/// negative P&L counts as a loss.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeStats {
    /// Every fill, buys included.
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winners over closed trades, `0..=1`.
    pub win_rate: f64,
    pub avg_profit_pct: Option<f64>,
    pub avg_win_pct: Option<f64>,
    pub avg_loss_pct: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

impl TradeStats {
    pub fn from_trades(trades: &[Trade]) -> Self {
        let sells: Vec<&Trade> = trades.iter().filter(|t| t.side == TradeSide::Sell).collect();
        let pct = |t: &&Trade| t.profit_pct.unwrap_or(0.0);

        let all: Vec<f64> = sells.iter().map(pct).collect();
        let wins: Vec<f64> = sells.iter().filter(|t| t.is_winner()).map(pct).collect();
        let losses: Vec<f64> = sells.iter().filter(|t| !t.is_winner()).map(pct).collect();

        TradeStats {
            total_trades: trades.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: if sells.is_empty() {
                0.0
            } else {
                wins.len() as f64 / sells.len() as f64
            },
            avg_profit_pct: mean(&all),
            avg_win_pct: mean(&wins),
            avg_loss_pct: mean(&losses),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(i as i64)
    }

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                timestamp: ts(i),
                cash: v,
                position_value: 0.0,
                equity: v,
            })
            .collect()
    }

    fn sell(pnl: f64, pct: f64) -> Trade {
        Trade {
            timestamp: ts(0),
            side: TradeSide::Sell,
            quantity: 1.0,
            price: 1.0,
            fee: 0.0,
            realized_pnl: Some(pnl),
            profit_pct: Some(pct),
            grid_level: None,
        }
    }

    fn buy() -> Trade {
        Trade {
            side: TradeSide::Buy,
            realized_pnl: None,
            profit_pct: None,
            ..sell(0.0, 0.0)
        }
    }

    #[test]
    fn empty_curve() {
        let metrics = Metrics::compute(10_000.0, &[], 0.02);
        assert_relative_eq!(metrics.final_equity, 10_000.0);
        assert_eq!(metrics.total_return_pct, 0.0);
        assert_eq!(metrics.annual_return_pct, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn total_and_annual_return() {
        let mut values = vec![10_000.0; 125];
        values.push(11_000.0);
        let metrics = Metrics::compute(10_000.0, &make_equity_curve(&values), 0.02);
        assert_relative_eq!(metrics.total_return_pct, 10.0, epsilon = 1e-9);
        // 126 bars is half a year
        assert_relative_eq!(metrics.annual_return_pct, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn max_drawdown_is_negative_percent() {
        let curve = make_equity_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        let metrics = Metrics::compute(100.0, &curve, 0.0);
        assert_relative_eq!(metrics.max_drawdown_pct, (80.0 - 110.0) / 110.0 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn rising_curve_has_no_drawdown() {
        let curve = make_equity_curve(&[100.0, 101.0, 102.0]);
        assert_eq!(Metrics::compute(100.0, &curve, 0.0).max_drawdown_pct, 0.0);
    }

    #[test]
    fn flat_curve_has_zero_sharpe() {
        let curve = make_equity_curve(&[100.0; 30]);
        assert_eq!(Metrics::compute(100.0, &curve, 0.02).sharpe_ratio, 0.0);
    }

    #[test]
    fn sharpe_matches_formula() {
        let curve = make_equity_curve(&[100.0, 110.0, 99.0]);
        let metrics = Metrics::compute(100.0, &curve, 0.02);
        // returns 0.1 and -0.1: sample std = sqrt(0.02)
        let std = 0.02_f64.sqrt();
        let annual = -1.0 / (3.0 / 252.0);
        let expected = (annual / 100.0 - 0.02) / (std * 252.0_f64.sqrt());
        assert_relative_eq!(metrics.sharpe_ratio, expected, epsilon = 1e-9);
    }

    #[test]
    fn single_return_has_zero_sharpe() {
        let curve = make_equity_curve(&[100.0, 110.0]);
        assert_eq!(Metrics::compute(100.0, &curve, 0.0).sharpe_ratio, 0.0);
    }

    #[test]
    fn trade_stats_counts_sells_only() {
        let trades = vec![buy(), sell(100.0, 10.0), buy(), sell(-50.0, -5.0), buy(), sell(0.0, 0.0)];
        let stats = TradeStats::from_trades(&trades);
        assert_eq!(stats.total_trades, 6);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.losing_trades, 2);
        assert_relative_eq!(stats.win_rate, 1.0 / 3.0);
        assert_relative_eq!(stats.avg_profit_pct.unwrap(), 5.0 / 3.0);
        assert_relative_eq!(stats.avg_win_pct.unwrap(), 10.0);
        assert_relative_eq!(stats.avg_loss_pct.unwrap(), -2.5);
    }

    #[test]
    fn trade_stats_without_sells() {
        let stats = TradeStats::from_trades(&[buy()]);
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.avg_profit_pct, None);
        assert_eq!(stats.avg_win_pct, None);
    }
}
