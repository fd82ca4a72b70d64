//! End-to-end tests over the public API with in-memory collaborators.
//!
//! Tests cover:
//! - The reference scenarios (flat prices, linear rally, all-in round trip,
//!   risk cap)
//! - Config-driven strategies through the full pipeline
//! - Batch backtests with failing and empty symbols
//! - Batch decisions, protective exits, deadlines and order submission

mod common;

use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use common::*;
use quantsig::adapters::file_config_adapter::FileConfigAdapter;
use quantsig::domain::backtest::{BacktestConfig, batch_backtest, run_backtest, simulate};
use quantsig::domain::decision::{
    DataRequest, OrderSide, SymbolOutcome, execute_decisions, make_decisions,
};
use quantsig::domain::error::{ErrorKind, QuantsigError};
use quantsig::domain::indicator::moving_average::calculate_sma;
use quantsig::domain::indicator::{IndicatorSpec, MacdSpec, MovingAverageSpec, SignalParams, get_signal};
use quantsig::domain::position::{Position, TradeSide};
use quantsig::domain::risk::{AccountSnapshot, Rejection, RiskConfig, evaluate};
use quantsig::domain::signal::Signal;
use quantsig::domain::strategy::{
    GridStrategy, MaCrossStrategy, MaType, SIGNAL_COLUMN, Strategy, build_strategy,
};
use quantsig::ports::account_port::AccountInfoProvider;

fn strategy_from(ini: &str) -> Strategy {
    build_strategy(&FileConfigAdapter::from_string(ini).unwrap()).unwrap()
}

mod scenarios {
    use super::*;

    #[test]
    fn flat_prices_produce_flat_indicators_and_no_signals() {
        let series = series_from_closes("FLAT", &[100.0; 50]);

        let sma = calculate_sma(&series, &MovingAverageSpec::new(20)).unwrap();
        let column = sma.column("sma_20").unwrap();
        assert!(column[..19].iter().all(Option::is_none));
        for value in &column[19..] {
            assert_relative_eq!(value.unwrap(), 100.0);
        }

        let macd = get_signal(
            &series,
            &IndicatorSpec::Macd(MacdSpec::default()),
            &SignalParams::Cross,
        )
        .unwrap();
        let macd_signals = macd.column("macd_12_26_9_cross_signal").unwrap();
        assert!(macd_signals.iter().flatten().all(|s| *s == 0.0));

        let ma_cross = Strategy::MaCross(MaCrossStrategy::new(5, 20, MaType::Simple).unwrap());
        let out = ma_cross.generate_signals(&series).unwrap();
        assert!(out.column(SIGNAL_COLUMN).unwrap().iter().flatten().all(|s| *s == 0.0));
    }

    #[test]
    fn linear_rally_crosses_once_upward() {
        let series = series_from_closes("UP", &linear(100.0, 150.0, 50));
        let strategy =
            Strategy::MaCross(MaCrossStrategy::new(5, 20, MaType::Exponential).unwrap());
        let out = strategy.generate_signals(&series).unwrap();
        let signals = out.column(SIGNAL_COLUMN).unwrap();

        let buys: Vec<usize> = (0..signals.len())
            .filter(|&i| signals[i] == Some(1.0))
            .collect();
        let sells = signals.iter().filter(|s| **s == Some(-1.0)).count();
        assert_eq!(buys.len(), 1);
        assert!(buys[0] < 5, "first cross at {}", buys[0]);
        assert_eq!(sells, 0);
    }

    #[test]
    fn all_in_round_trip() {
        // signal on bar 10 fills at bar 11 (close 100); sell on bar 20 fills
        // at bar 21 (close 110)
        let closes: Vec<f64> = (0..30).map(|i| if i <= 15 { 100.0 } else { 110.0 }).collect();
        let series = with_signals(
            series_from_closes("RT", &closes),
            &[(10, 1.0), (20, -1.0)],
        );
        let result = simulate(&series, "manual", &BacktestConfig::default()).unwrap();

        assert_eq!(result.trades.len(), 2);
        let buy = &result.trades[0];
        assert_eq!(buy.side, TradeSide::Buy);
        assert_relative_eq!(buy.price, 100.0);
        assert_relative_eq!(buy.quantity, 100.0);
        assert_relative_eq!(result.equity_curve[11].cash, 0.0);

        let sell = &result.trades[1];
        assert_eq!(sell.side, TradeSide::Sell);
        assert_relative_eq!(sell.price, 110.0);
        assert_relative_eq!(sell.realized_pnl.unwrap(), 1000.0);
        assert_relative_eq!(sell.profit_pct.unwrap(), 10.0);
        assert_relative_eq!(result.equity_curve[21].cash, 11_000.0);
        assert_relative_eq!(result.final_equity, 11_000.0);
        assert_relative_eq!(result.total_return_pct, 10.0, epsilon = 1e-9);
        assert_eq!(result.stats.winning_trades, 1);
        assert_relative_eq!(result.stats.win_rate, 1.0);
    }

    #[test]
    fn buy_at_position_cap_is_rejected() {
        let account = AccountSnapshot::new(100_000.0).with_position(Position::new("BTC", 100.0, 90.0));
        let config = RiskConfig {
            max_position_fraction: 0.1,
            ..Default::default()
        };
        let decision = evaluate(Signal::Buy, "BTC", 100.0, &account, &config);
        assert!(!decision.execute);
        assert_eq!(decision.quantity, 0.0);
        assert_eq!(decision.rejection, Some(Rejection::AtPositionCap));
    }
}

mod config_driven_pipeline {
    use super::*;

    const MACD_INI: &str = r#"
[strategy]
type = macd_cross
fast_period = 5
slow_period = 12
signal_period = 4
"#;

    #[test]
    fn configured_strategy_backtests_end_to_end() {
        let strategy = strategy_from(MACD_INI);
        let series = series_from_closes("OSC", &oscillating(100.0, 8.0, 120));
        let result = run_backtest(&series, &strategy, &BacktestConfig::default()).unwrap();

        assert_eq!(result.strategy, "macd_cross");
        assert_eq!(result.equity_curve.len(), 120);
        assert!(!result.trades.is_empty());
        for point in &result.equity_curve {
            assert_relative_eq!(point.equity, point.cash + point.position_value, epsilon = 1e-6);
            assert!(point.cash >= 0.0);
        }
        assert!(result.max_drawdown_pct <= 0.0);
        // buys and sells alternate in a single-slot backtest
        for pair in result.trades.windows(2) {
            assert_ne!(pair[0].side, pair[1].side);
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let strategy = strategy_from(MACD_INI);
        let series = series_from_closes("OSC", &oscillating(50.0, 3.0, 200));
        let config = BacktestConfig {
            commission: 0.001,
            ..Default::default()
        };
        let first = run_backtest(&series, &strategy, &config).unwrap();
        let second = run_backtest(&series, &strategy, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(format!("{:?}", first.trades), format!("{:?}", second.trades));
    }

    #[test]
    fn grid_backtest_respects_levels() {
        let strategy = strategy_from(
            "[strategy]\ntype = grid\nupper_price = 110\nlower_price = 90\ngrid_num = 4\n",
        );
        let series = series_from_closes("GRID", &oscillating(100.0, 9.0, 150));
        let result = run_backtest(&series, &strategy, &BacktestConfig::default()).unwrap();

        assert!(result.trades.iter().all(|t| t.grid_level.is_some_and(|l| l < 4)));
        assert!(result.trades.iter().all(|t| t.quantity == 1.0));
        assert!(result.open_quantity <= 4.0);
        let buys = result.trades.iter().filter(|t| t.side == TradeSide::Buy).count();
        let sells = result.trades.len() - buys;
        assert_relative_eq!(result.open_quantity, (buys - sells) as f64);
    }

    #[test]
    fn invalid_grid_configs_fail_before_any_data() {
        for ini in [
            "[strategy]\ntype = grid\nupper_price = 90\nlower_price = 110\n",
            "[strategy]\ntype = grid\nupper_price = 100\nlower_price = 100\n",
            "[strategy]\ntype = grid\nupper_price = 110\nlower_price = 90\ngrid_num = 0\n",
            "[strategy]\ntype = grid\nupper_price = 110\nlower_price = 90\ngrid_num = -3\n",
        ] {
            let err = build_strategy(&FileConfigAdapter::from_string(ini).unwrap()).unwrap_err();
            assert!(matches!(err, QuantsigError::InvalidGrid { .. }), "{ini}: {err}");
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
        assert!(GridStrategy::new(110.0, 90.0, 0).is_err());
    }

    #[test]
    fn unknown_strategy_tag() {
        let err = build_strategy(
            &FileConfigAdapter::from_string("[strategy]\ntype = breakout\nsubtype = donchian\n")
                .unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, QuantsigError::UnknownStrategy { .. }));
    }
}

mod batch {
    use super::*;

    #[test]
    fn failing_symbols_do_not_abort_the_batch() {
        let provider = MockDataProvider::new()
            .with_closes("GOOD", &oscillating(100.0, 5.0, 80))
            .with_error("BROKEN", "corrupt feed");
        let symbols = vec!["GOOD".to_string(), "BROKEN".to_string(), "MISSING".to_string()];
        let strategy = strategy_from("[strategy]\ntype = rsi\nrsi_period = 6\n");

        let results = batch_backtest(
            &provider,
            &symbols,
            "1d",
            500,
            &strategy,
            &BacktestConfig::default(),
        );

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].symbol, "GOOD");
        assert!(results[0].result.is_ok());
        assert!(matches!(
            results[1].result,
            Err(QuantsigError::MalformedSeries { .. })
        ));
        assert!(matches!(
            &results[2].result,
            Err(QuantsigError::NoData { symbol }) if symbol == "MISSING"
        ));
    }

    #[test]
    fn limit_bounds_the_replayed_history() {
        let provider = MockDataProvider::new().with_closes("AAA", &oscillating(10.0, 1.0, 300));
        let strategy = strategy_from("[strategy]\ntype = ma_cross\nfast_period = 3\nslow_period = 8\n");
        let results = batch_backtest(
            &provider,
            &["AAA".to_string()],
            "1d",
            60,
            &strategy,
            &BacktestConfig::default(),
        );
        let result = results[0].result.as_ref().unwrap();
        assert_eq!(result.equity_curve.len(), 60);
    }
}

mod decisions {
    use super::*;

    fn grid() -> Strategy {
        Strategy::Grid(GridStrategy::new(110.0, 90.0, 4).unwrap())
    }

    fn now() -> chrono::NaiveDateTime {
        day(100)
    }

    #[test]
    fn batch_decides_each_symbol_against_one_snapshot() {
        // falling through a grid level on the last bar is a buy; rising is a sell
        let provider = MockDataProvider::new()
            .with_closes("DOWN", &[101.0, 101.0, 94.0])
            .with_closes("UP", &[94.0, 94.0, 101.0])
            .with_closes("FLAT", &[101.0, 101.0, 101.0]);
        let account = MockAccount::new(100_000.0).holding("UP", 20.0, 100.0);
        let snapshot = account.get_account_snapshot().unwrap();
        let symbols: Vec<String> = ["DOWN", "UP", "FLAT"].iter().map(|s| s.to_string()).collect();
        let risk = RiskConfig {
            stop_loss_pct: 0.0,
            take_profit_pct: 0.0,
            ..Default::default()
        };

        let outcomes = make_decisions(
            &provider,
            &snapshot,
            &grid(),
            &symbols,
            &DataRequest::default(),
            &risk,
            now(),
            None,
        );
        assert_eq!(outcomes.len(), 3);

        let down = outcomes[0].decision().unwrap();
        assert_eq!(down.signal, Signal::Buy);
        assert!(down.execute);
        // cap is 10_000 at price 94
        assert_relative_eq!(down.quantity, 10_000.0 / 94.0);
        assert_eq!(down.timestamp, now());
        assert_eq!(down.bar_timestamp, day(2));

        let up = outcomes[1].decision().unwrap();
        assert_eq!(up.signal, Signal::Sell);
        assert_relative_eq!(up.quantity, 20.0);

        let flat = outcomes[2].decision().unwrap();
        assert_eq!(flat.signal, Signal::Hold);
        assert!(!flat.execute);

        let decisions: Vec<_> = outcomes.iter().filter_map(|o| o.decision().cloned()).collect();
        let mut executor = RecordingExecutor {
            reject: vec!["UP".to_string()],
            ..Default::default()
        };
        let reports = execute_decisions(&mut executor, &decisions);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].order.side, OrderSide::Buy);
        assert!(reports[0].result.is_ok());
        assert!(reports[1].result.is_err());
        assert_eq!(executor.orders.len(), 1);
        assert_eq!(executor.orders[0].symbol, "DOWN");
    }

    #[test]
    fn stop_loss_overrides_hold() {
        let provider = MockDataProvider::new().with_closes("BTC", &[101.0, 101.0, 101.0]);
        let snapshot = AccountSnapshot::new(50_000.0).with_position(Position::new("BTC", 3.0, 120.0));
        let outcomes = make_decisions(
            &provider,
            &snapshot,
            &grid(),
            &["BTC".to_string()],
            &DataRequest::default(),
            &RiskConfig::default(),
            now(),
            None,
        );
        let decision = outcomes[0].decision().unwrap();
        assert_eq!(decision.raw_signal, Some(Signal::Hold));
        assert_eq!(decision.signal, Signal::Sell);
        assert!(decision.trigger.is_some());
        assert!(decision.execute);
        assert_relative_eq!(decision.quantity, 3.0);
    }

    #[test]
    fn expired_deadline_cancels_remaining_symbols() {
        let provider = MockDataProvider::new().with_closes("A", &[100.0, 101.0]);
        let past = Instant::now()
            .checked_sub(Duration::from_millis(5))
            .unwrap_or_else(Instant::now);
        let outcomes = make_decisions(
            &provider,
            &AccountSnapshot::new(1_000.0),
            &grid(),
            &["A".to_string(), "B".to_string()],
            &DataRequest::default(),
            &RiskConfig::default(),
            now(),
            Some(past),
        );
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, SymbolOutcome::Cancelled { .. })));
        assert_eq!(outcomes[1].symbol(), "B");
    }

    #[test]
    fn missing_data_fails_only_that_symbol() {
        let provider = MockDataProvider::new().with_closes("A", &[100.0, 95.0]);
        let outcomes = make_decisions(
            &provider,
            &AccountSnapshot::new(1_000.0),
            &grid(),
            &["NOPE".to_string(), "A".to_string()],
            &DataRequest::default(),
            &RiskConfig::default(),
            now(),
            None,
        );
        assert!(matches!(
            &outcomes[0],
            SymbolOutcome::Failed { error: QuantsigError::NoData { .. }, .. }
        ));
        assert!(outcomes[1].decision().is_some());
    }
}
