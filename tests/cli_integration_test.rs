//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config validation with real INI files on disk
//! - Backtest pipeline over mock and CSV data
//! - Decision pipeline with a dry-run executor

mod common;

use std::fs;
use std::process::ExitCode;

use common::*;
use quantsig::adapters::csv_adapter::CsvAdapter;
use quantsig::adapters::file_config_adapter::FileConfigAdapter;
use quantsig::cli::{self, DryRunExecutor};
use quantsig::domain::backtest::BacktestConfig;
use quantsig::domain::decision::{DataRequest, OrderSide};
use quantsig::domain::indicator::IndicatorSpec;
use quantsig::domain::risk::RiskConfig;
use quantsig::domain::strategy::{GridStrategy, Strategy, build_strategy};
use quantsig::ports::data_port::MarketDataProvider;

// ExitCode has no PartialEq on every toolchain, so compare the debug form
fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

const VALID_INI: &str = r#"
[strategy]
type = breakout
subtype = bollinger
window = 10
std_dev = 1.5
breakout_type = mean_reversion

[backtest]
initial_capital = 20000
position_size = 0.5
commission = 0.001

[risk]
max_position_fraction = 0.2
min_notional = 5

[data]
symbols = AAA, BBB
timeframe = 1d
limit = 250
"#;

mod validate_command {
    use super::*;

    #[test]
    fn valid_config_succeeds() {
        let file = write_temp_ini(VALID_INI);
        assert!(same_code(cli::run_validate(file.path()), ExitCode::SUCCESS));
    }

    #[test]
    fn invalid_backtest_value_is_config_error() {
        let file = write_temp_ini(&VALID_INI.replace("position_size = 0.5", "position_size = 2"));
        assert!(same_code(cli::run_validate(file.path()), ExitCode::from(2)));
    }

    #[test]
    fn unknown_strategy_is_config_error() {
        let file = write_temp_ini("[strategy]\ntype = martingale\n");
        assert!(same_code(cli::run_validate(file.path()), ExitCode::from(2)));
    }

    #[test]
    fn duplicate_symbol_is_config_error() {
        let file = write_temp_ini(&VALID_INI.replace("AAA, BBB", "AAA, aaa"));
        assert!(same_code(cli::run_validate(file.path()), ExitCode::from(2)));
    }

    #[test]
    fn nan_risk_fraction_is_config_error() {
        let file = write_temp_ini(
            &VALID_INI.replace("max_position_fraction = 0.2", "max_position_fraction = nan"),
        );
        assert!(same_code(cli::run_validate(file.path()), ExitCode::from(2)));
    }

    #[test]
    fn non_numeric_values_are_config_errors() {
        let grid = "[strategy]\ntype = grid\nupper_price = 110\nlower_price = 90\ngrid_num = abc\n";
        let file = write_temp_ini(grid);
        assert!(same_code(cli::run_validate(file.path()), ExitCode::from(2)));

        let file = write_temp_ini(&VALID_INI.replace("initial_capital = 20000", "initial_capital = lots"));
        assert!(same_code(cli::run_validate(file.path()), ExitCode::from(2)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let code = cli::run_validate(std::path::Path::new("/nonexistent/quantsig.ini"));
        assert!(same_code(code, ExitCode::from(1)));
    }

    #[test]
    fn data_dir_resolution_order() {
        let config = FileConfigAdapter::from_string("[data]\ndir = /srv/bars\n").unwrap();
        assert_eq!(
            cli::resolve_data_dir(Some(std::path::Path::new("/tmp/x")), &config),
            std::path::PathBuf::from("/tmp/x")
        );
        assert_eq!(
            cli::resolve_data_dir(None, &config),
            std::path::PathBuf::from("/srv/bars")
        );
        let empty = FileConfigAdapter::from_string("").unwrap();
        assert_eq!(
            cli::resolve_data_dir(None, &empty),
            std::path::PathBuf::from("data")
        );
    }
}

mod backtest_command {
    use super::*;

    fn strategy() -> Strategy {
        build_strategy(&FileConfigAdapter::from_string(VALID_INI).unwrap()).unwrap()
    }

    #[test]
    fn partial_failure_still_succeeds() {
        let provider = MockDataProvider::new()
            .with_closes("AAA", &oscillating(100.0, 6.0, 90))
            .with_error("BBB", "bad feed");
        let code = cli::run_backtest_pipeline(
            &provider,
            &strategy(),
            &BacktestConfig::default(),
            &["AAA".to_string(), "BBB".to_string()],
            &DataRequest::default(),
        );
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn all_symbols_failing_returns_data_error() {
        let provider = MockDataProvider::new();
        let code = cli::run_backtest_pipeline(
            &provider,
            &strategy(),
            &BacktestConfig::default(),
            &["AAA".to_string()],
            &DataRequest::default(),
        );
        assert!(same_code(code, ExitCode::from(5)));
    }

    #[test]
    fn csv_directory_pipeline() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut csv = String::from("timestamp,open,high,low,close,volume\n");
        for (i, close) in oscillating(100.0, 6.0, 60).iter().enumerate() {
            let ts = day(i).format("%Y-%m-%d");
            csv.push_str(&format!("{ts},{close},{close},{close},{close},1000\n"));
        }
        fs::write(dir.path().join("AAA_1d.csv"), csv).unwrap();

        let provider = CsvAdapter::new(dir.path());
        assert_eq!(provider.get_bars("AAA", "1d", 500).unwrap().len(), 60);
        let code = cli::run_backtest_pipeline(
            &provider,
            &strategy(),
            &BacktestConfig::default(),
            &provider.list_symbols("1d").unwrap(),
            &DataRequest::default(),
        );
        assert!(same_code(code, ExitCode::SUCCESS));
    }
}

mod decide_command {
    use super::*;

    #[test]
    fn executable_decisions_reach_the_executor() {
        let provider = MockDataProvider::new()
            .with_closes("DOWN", &[101.0, 101.0, 94.0])
            .with_closes("FLAT", &[101.0, 101.0, 101.0]);
        let account = MockAccount::new(10_000.0);
        let strategy = Strategy::Grid(GridStrategy::new(110.0, 90.0, 4).unwrap());
        let mut executor = DryRunExecutor::default();

        let code = cli::run_decide_pipeline(
            &provider,
            &account,
            &strategy,
            &["DOWN".to_string(), "FLAT".to_string()],
            &DataRequest::default(),
            &RiskConfig::default(),
            day(10),
            None,
            &mut executor,
        );

        assert!(same_code(code, ExitCode::SUCCESS));
        assert_eq!(executor.submitted.len(), 1);
        assert_eq!(executor.submitted[0].symbol, "DOWN");
        assert_eq!(executor.submitted[0].side, OrderSide::Buy);
    }

    #[test]
    fn no_decisions_is_data_error() {
        let provider = MockDataProvider::new();
        let strategy = Strategy::Grid(GridStrategy::new(110.0, 90.0, 4).unwrap());
        let mut executor = DryRunExecutor::default();
        let code = cli::run_decide_pipeline(
            &provider,
            &MockAccount::new(10_000.0),
            &strategy,
            &["NONE".to_string()],
            &DataRequest::default(),
            &RiskConfig::default(),
            day(10),
            None,
            &mut executor,
        );
        assert!(same_code(code, ExitCode::from(5)));
        assert!(executor.submitted.is_empty());
    }
}

mod analyze_command {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn params_apply_to_the_named_indicator() {
        let (specs, requests) =
            cli::parse_indicator_request(&tags(&["macd"]), &tags(&["fast=8"]), None).unwrap();
        match &specs[..] {
            [IndicatorSpec::Macd(macd)] => {
                assert_eq!(macd.fast, 8);
                assert_eq!(macd.slow, 26);
            }
            other => panic!("expected one macd spec, got {other:?}"),
        }
        assert!(requests.is_empty());

        let (specs, requests) = cli::parse_indicator_request(
            &tags(&["ma", "rsi"]),
            &tags(&["window=5"]),
            Some("trend"),
        )
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn bad_requests_are_configuration_errors() {
        let err = cli::parse_indicator_request(&tags(&["ichimoku"]), &[], None).unwrap_err();
        assert!(err.is_configuration());
        let err = cli::parse_indicator_request(&tags(&["macd"]), &tags(&["fast"]), None)
            .unwrap_err();
        assert!(err.is_configuration());
        let err = cli::parse_indicator_request(&tags(&["macd"]), &tags(&["fast=x"]), None)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn failing_symbol_does_not_fail_the_batch() {
        let provider = MockDataProvider::new()
            .with_closes("AAA", &linear(100.0, 130.0, 60))
            .with_error("BBB", "bad feed");
        let (mut specs, requests) =
            cli::parse_indicator_request(&tags(&["macd"]), &tags(&["fast=8"]), Some("cross"))
                .unwrap();
        let (rsi, _) = cli::parse_indicator_request(&tags(&["rsi"]), &[], None).unwrap();
        specs.extend(rsi);
        let code = cli::run_analyze_pipeline(
            &provider,
            &specs,
            &requests,
            &["AAA".to_string(), "BBB".to_string()],
            &DataRequest::default(),
        );
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn all_symbols_failing_returns_data_error() {
        let provider = MockDataProvider::new().with_error("BBB", "bad feed");
        let (specs, _) = cli::parse_indicator_request(&tags(&["rsi"]), &[], None).unwrap();
        let code = cli::run_analyze_pipeline(
            &provider,
            &specs,
            &[],
            &["BBB".to_string(), "NONE".to_string()],
            &DataRequest::default(),
        );
        assert!(same_code(code, ExitCode::from(5)));
    }
}

mod screen_command {
    use super::*;

    fn grid() -> Strategy {
        Strategy::Grid(GridStrategy::new(110.0, 90.0, 4).unwrap())
    }

    #[test]
    fn failing_symbol_does_not_fail_the_screen() {
        let provider = MockDataProvider::new()
            .with_closes("DOWN", &[101.0, 101.0, 94.0])
            .with_closes("FLAT", &[101.0, 101.0, 101.0])
            .with_error("BAD", "bad feed");
        let code = cli::run_screen_pipeline(
            &provider,
            &[grid()],
            &["DOWN".to_string(), "FLAT".to_string(), "BAD".to_string()],
            &DataRequest::default(),
        );
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn all_symbols_failing_returns_data_error() {
        let provider = MockDataProvider::new().with_error("BAD", "bad feed");
        let code = cli::run_screen_pipeline(
            &provider,
            &[grid()],
            &["BAD".to_string(), "NONE".to_string()],
            &DataRequest::default(),
        );
        assert!(same_code(code, ExitCode::from(5)));
    }
}
