//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};

use crate::adapters::config_account_adapter::ConfigAccountAdapter;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analysis::{Analysis, Quote, analyze, screen};
use crate::domain::backtest::{BacktestConfig, BacktestResult, batch_backtest};
use crate::domain::config_validation::{
    build_backtest_config, build_data_request, build_risk_config,
};
use crate::domain::decision::{
    DataRequest, Decision, OrderRequest, SymbolOutcome, execute_decisions, make_decisions,
};
use crate::domain::error::QuantsigError;
use crate::domain::indicator::{IndicatorParams, IndicatorSpec, SignalParams, SignalRequest};
use crate::domain::risk::RiskConfig;
use crate::domain::strategy::{SIGNAL_COLUMN, Strategy, build_strategy};
use crate::domain::universe::{UniverseError, parse_symbols, resolve_symbols};
use crate::ports::account_port::AccountInfoProvider;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataProvider;
use crate::ports::order_port::OrderExecutor;

#[derive(Parser, Debug)]
#[command(
    name = "quantsig",
    about = "Indicator signals, strategy backtests and risk-bounded decisions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest the configured strategy over one or more symbols
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <SYMBOL>_<TIMEFRAME>.csv files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Comma-separated symbols; defaults to [data] symbols, then every file
        #[arg(short, long)]
        symbols: Option<String>,
    },
    /// Print the strategy signal for the most recent bars of one symbol
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 20)]
        last: usize,
    },
    /// Make risk-checked decisions for the latest bar and print the orders
    Decide {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        symbols: Option<String>,
        /// Stop evaluating further symbols after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Latest price move and indicator values for one or more symbols
    Analyze {
        /// Optional config for [data] dir, symbols, timeframe and limit
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        symbols: Option<String>,
        /// Indicator tag (ma, ema, macd, rsi, bollinger, kdj, volume); repeatable
        #[arg(short, long = "indicator", required = true)]
        indicators: Vec<String>,
        /// key=value parameter applied to every indicator; repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Also report this signal type (cross, trend, level, ...) per indicator
        #[arg(long)]
        signal: Option<String>,
    },
    /// List the symbols whose latest bar carries a buy signal
    Screen {
        /// One config per strategy, tried in order; the first supplies [data]
        #[arg(short, long, required = true)]
        config: Vec<PathBuf>,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        symbols: Option<String>,
    },
    /// Validate a configuration file without loading any data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbols,
        } => run_backtest(&config, data_dir.as_deref(), symbols.as_deref()),
        Command::Signals {
            config,
            data_dir,
            symbol,
            last,
        } => run_signals(&config, data_dir.as_deref(), &symbol, last),
        Command::Decide {
            config,
            data_dir,
            symbols,
            timeout_secs,
        } => run_decide(
            &config,
            data_dir.as_deref(),
            symbols.as_deref(),
            timeout_secs.map(Duration::from_secs),
        ),
        Command::Analyze {
            config,
            data_dir,
            symbols,
            indicators,
            params,
            signal,
        } => run_analyze(
            config.as_deref(),
            data_dir.as_deref(),
            symbols.as_deref(),
            &indicators,
            &params,
            signal.as_deref(),
        ),
        Command::Screen {
            config,
            data_dir,
            symbols,
        } => run_screen(&config, data_dir.as_deref(), symbols.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &QuantsigError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// `--data-dir`, else `[data] dir`, else `./data`.
pub fn resolve_data_dir(explicit: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("data", "dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Explicit or configured symbols; with neither, every CSV for the timeframe.
fn symbols_for(
    explicit: Option<&str>,
    config: &dyn ConfigPort,
    adapter: &CsvAdapter,
    timeframe: &str,
) -> Result<Vec<String>, ExitCode> {
    let symbols = match resolve_symbols(explicit, config) {
        Ok(symbols) => symbols,
        Err(UniverseError::NoSymbols) => adapter.list_symbols(timeframe).map_err(|e| fail(&e))?,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(ExitCode::from(2));
        }
    };
    if symbols.is_empty() {
        eprintln!("error: {}", UniverseError::NoSymbols);
        return Err(ExitCode::from(2));
    }
    Ok(symbols)
}

struct LoadedConfig {
    adapter: FileConfigAdapter,
    strategy: Strategy,
    backtest: BacktestConfig,
    risk: RiskConfig,
    data: DataRequest,
}

fn load_all(path: &Path) -> Result<LoadedConfig, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    let backtest = build_backtest_config(&adapter).map_err(|e| fail(&e))?;
    let risk = build_risk_config(&adapter).map_err(|e| fail(&e))?;
    let data = build_data_request(&adapter).map_err(|e| fail(&e))?;
    let strategy = build_strategy(&adapter).map_err(|e| fail(&e))?;
    Ok(LoadedConfig {
        adapter,
        strategy,
        backtest,
        risk,
        data,
    })
}

fn run_backtest(config_path: &Path, data_dir: Option<&Path>, symbols: Option<&str>) -> ExitCode {
    let loaded = match load_all(config_path) {
        Ok(l) => l,
        Err(code) => return code,
    };
    let provider = CsvAdapter::new(resolve_data_dir(data_dir, &loaded.adapter));
    let symbols = match symbols_for(symbols, &loaded.adapter, &provider, &loaded.data.timeframe) {
        Ok(s) => s,
        Err(code) => return code,
    };
    run_backtest_pipeline(
        &provider,
        &loaded.strategy,
        &loaded.backtest,
        &symbols,
        &loaded.data,
    )
}

/// Backtest every symbol and print one summary block each. Succeeds when at
/// least one symbol produced a result.
pub fn run_backtest_pipeline(
    provider: &dyn MarketDataProvider,
    strategy: &Strategy,
    config: &BacktestConfig,
    symbols: &[String],
    data: &DataRequest,
) -> ExitCode {
    eprintln!(
        "Running {} on {} symbol(s), timeframe {}, last {} bars",
        strategy.description(),
        symbols.len(),
        data.timeframe,
        data.limit
    );

    let outcomes = batch_backtest(provider, symbols, &data.timeframe, data.limit, strategy, config);
    let mut first_error: Option<ExitCode> = None;
    let mut succeeded = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(result) => {
                succeeded += 1;
                print_backtest_summary(result);
            }
            Err(e) => {
                eprintln!("warning: {} failed: {e}", outcome.symbol);
                first_error.get_or_insert_with(|| e.into());
            }
        }
    }

    eprintln!("\n{succeeded} of {} symbol(s) backtested", outcomes.len());
    match (succeeded, first_error) {
        (0, Some(code)) => code,
        _ => ExitCode::SUCCESS,
    }
}

fn print_backtest_summary(result: &BacktestResult) {
    let stats = &result.stats;
    println!("\n=== {} ({}) ===", result.symbol, result.strategy);
    println!("Initial Capital:  {:.2}", result.initial_capital);
    println!("Final Equity:     {:.2}", result.final_equity);
    println!("Total Return:     {:.2}%", result.total_return_pct);
    println!("Annualized:       {:.2}%", result.annual_return_pct);
    println!("Max Drawdown:     {:.2}%", result.max_drawdown_pct);
    println!("Sharpe Ratio:     {:.2}", result.sharpe_ratio);
    println!("Total Trades:     {}", stats.total_trades);
    println!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    if let Some(avg) = stats.avg_profit_pct {
        println!("Avg Profit:       {avg:.2}%");
    }
    if result.open_quantity > 0.0 {
        println!("Open Quantity:    {}", result.open_quantity);
    }
}

fn run_signals(config_path: &Path, data_dir: Option<&Path>, symbol: &str, last: usize) -> ExitCode {
    let loaded = match load_all(config_path) {
        Ok(l) => l,
        Err(code) => return code,
    };
    let provider = CsvAdapter::new(resolve_data_dir(data_dir, &loaded.adapter));
    let symbol = symbol.trim().to_uppercase();

    let signaled = match provider
        .get_bars(&symbol, &loaded.data.timeframe, loaded.data.limit)
        .and_then(|series| loaded.strategy.generate_signals(&series))
    {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    println!("{} {}", symbol, loaded.strategy.description());
    let recent = signaled.tail(last);
    for (i, bar) in recent.bars().iter().enumerate() {
        let label = recent
            .signal_at(SIGNAL_COLUMN, i)
            .map(|s| s.label())
            .unwrap_or("-");
        println!("{}  {:>12.4}  {}", bar.timestamp, bar.close, label);
    }
    ExitCode::SUCCESS
}

/// Order executor that prints each order instead of sending it anywhere.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    pub submitted: Vec<OrderRequest>,
}

impl OrderExecutor for DryRunExecutor {
    fn submit(&mut self, order: &OrderRequest) -> Result<String, QuantsigError> {
        self.submitted.push(order.clone());
        let id = format!("dry-run-{}", self.submitted.len());
        println!(
            "ORDER {id}: {} {} {:.6} {:?}",
            order.side, order.symbol, order.quantity, order.order_type
        );
        Ok(id)
    }
}

fn run_decide(
    config_path: &Path,
    data_dir: Option<&Path>,
    symbols: Option<&str>,
    timeout: Option<Duration>,
) -> ExitCode {
    let loaded = match load_all(config_path) {
        Ok(l) => l,
        Err(code) => return code,
    };
    let provider = CsvAdapter::new(resolve_data_dir(data_dir, &loaded.adapter));
    let symbols = match symbols_for(symbols, &loaded.adapter, &provider, &loaded.data.timeframe) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let account = ConfigAccountAdapter::new(&loaded.adapter);
    let mut executor = DryRunExecutor::default();
    run_decide_pipeline(
        &provider,
        &account,
        &loaded.strategy,
        &symbols,
        &loaded.data,
        &loaded.risk,
        Local::now().naive_local(),
        timeout.map(|t| Instant::now() + t),
        &mut executor,
    )
}

/// Snapshot the account once, decide every symbol, and submit the
/// executable decisions.
#[allow(clippy::too_many_arguments)]
pub fn run_decide_pipeline(
    provider: &dyn MarketDataProvider,
    account_provider: &dyn AccountInfoProvider,
    strategy: &Strategy,
    symbols: &[String],
    data: &DataRequest,
    risk: &RiskConfig,
    now: NaiveDateTime,
    deadline: Option<Instant>,
    executor: &mut dyn OrderExecutor,
) -> ExitCode {
    let account = match account_provider.get_account_snapshot() {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };
    eprintln!(
        "Deciding {} symbol(s) with {} (total assets {:.2})",
        symbols.len(),
        strategy.description(),
        account.total_assets
    );

    let outcomes = make_decisions(
        provider, &account, strategy, symbols, data, risk, now, deadline,
    );
    let mut decisions: Vec<Decision> = Vec::new();
    for outcome in outcomes {
        match outcome {
            SymbolOutcome::Decided(d) => {
                print_decision(&d);
                decisions.push(d);
            }
            SymbolOutcome::Failed { symbol, error } => {
                eprintln!("warning: {symbol} failed: {error}");
            }
            SymbolOutcome::Cancelled { symbol } => {
                eprintln!("warning: {symbol} cancelled (deadline passed)");
            }
        }
    }

    let reports = execute_decisions(executor, &decisions);
    let failed = reports.iter().filter(|r| r.result.is_err()).count();
    eprintln!(
        "\n{} decision(s), {} order(s) submitted, {} failed",
        decisions.len(),
        reports.len() - failed,
        failed
    );
    if decisions.is_empty() && !symbols.is_empty() {
        return ExitCode::from(5);
    }
    ExitCode::SUCCESS
}

fn print_decision(d: &Decision) {
    let outcome = match (d.execute, d.rejection) {
        (true, _) => format!("execute {:.6}", d.quantity),
        (false, Some(reason)) => format!("skip ({reason})"),
        (false, None) => "skip".to_string(),
    };
    let trigger = d
        .trigger
        .map(|t| format!(" [{t:?}]"))
        .unwrap_or_default();
    println!(
        "{}  {}  close {:.4}  {}{}  {}",
        d.symbol,
        d.bar_timestamp,
        d.current_price,
        d.signal.label(),
        trigger,
        outcome
    );
}

/// Indicator specs for `tags`, each reading its keys from the shared
/// `key=value` pairs, plus one signal request per spec when `signal` is set.
pub fn parse_indicator_request(
    tags: &[String],
    pairs: &[String],
    signal: Option<&str>,
) -> Result<(Vec<IndicatorSpec>, Vec<SignalRequest>), QuantsigError> {
    let params = IndicatorParams::parse_pairs(pairs.iter().map(String::as_str))?;
    let specs = tags
        .iter()
        .map(|tag| IndicatorSpec::from_tag(tag, &params))
        .collect::<Result<Vec<_>, _>>()?;
    let requests = match signal {
        None => Vec::new(),
        Some(tag) => specs
            .iter()
            .map(|spec| {
                SignalParams::from_tag(spec.kind(), tag, &params)
                    .map(|p| SignalRequest::new(spec.clone(), p))
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok((specs, requests))
}

fn run_analyze(
    config_path: Option<&Path>,
    data_dir: Option<&Path>,
    symbols: Option<&str>,
    tags: &[String],
    pairs: &[String],
    signal: Option<&str>,
) -> ExitCode {
    let adapter = match config_path {
        Some(path) => match load_config(path) {
            Ok(a) => a,
            Err(code) => return code,
        },
        None => match FileConfigAdapter::from_string("") {
            Ok(a) => a,
            Err(e) => return fail(&e),
        },
    };
    let (specs, requests) = match parse_indicator_request(tags, pairs, signal) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let data = match build_data_request(&adapter) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    let provider = CsvAdapter::new(resolve_data_dir(data_dir, &adapter));
    let symbols = match symbols_for(symbols, &adapter, &provider, &data.timeframe) {
        Ok(s) => s,
        Err(code) => return code,
    };
    run_analyze_pipeline(&provider, &specs, &requests, &symbols, &data)
}

/// Analyze every symbol and print one block each. Succeeds when at least one
/// symbol was analyzed.
pub fn run_analyze_pipeline(
    provider: &dyn MarketDataProvider,
    specs: &[IndicatorSpec],
    requests: &[SignalRequest],
    symbols: &[String],
    data: &DataRequest,
) -> ExitCode {
    let outcomes = analyze(provider, symbols, &data.timeframe, data.limit, specs, requests);
    let mut first_error: Option<ExitCode> = None;
    let mut succeeded = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(analysis) => {
                succeeded += 1;
                print_analysis(&outcome.symbol, analysis);
            }
            Err(e) => {
                eprintln!("warning: {} failed: {e}", outcome.symbol);
                first_error.get_or_insert_with(|| e.into());
            }
        }
    }
    eprintln!("\n{succeeded} of {} symbol(s) analyzed", outcomes.len());
    match (succeeded, first_error) {
        (0, Some(code)) => code,
        _ => ExitCode::SUCCESS,
    }
}

fn format_quote(quote: &Quote) -> String {
    let change = match (quote.price_change, quote.price_change_pct) {
        (Some(abs), Some(pct)) => format!("{abs:+.4} ({pct:+.2}%)"),
        (Some(abs), None) => format!("{abs:+.4}"),
        _ => "-".to_string(),
    };
    format!(
        "{}  close {:.4}  change {}  volume {:.0}",
        quote.bar_timestamp, quote.latest_price, change, quote.volume
    )
}

fn print_analysis(symbol: &str, analysis: &Analysis) {
    println!("\n=== {symbol} ===");
    println!("{}", format_quote(&analysis.quote));
    for reading in &analysis.indicators {
        println!("{}", reading.indicator);
        for (column, value) in &reading.values {
            match value {
                Some(v) => println!("  {column:<28} {v:.4}"),
                None => println!("  {column:<28} -"),
            }
        }
    }
    for (column, signal) in &analysis.signals {
        println!(
            "  {column:<28} {}",
            signal.map(|s| s.label()).unwrap_or("-")
        );
    }
}

fn run_screen(config_paths: &[PathBuf], data_dir: Option<&Path>, symbols: Option<&str>) -> ExitCode {
    let Some((first, rest)) = config_paths.split_first() else {
        eprintln!("error: at least one --config is required");
        return ExitCode::from(2);
    };
    let loaded = match load_all(first) {
        Ok(l) => l,
        Err(code) => return code,
    };
    let mut strategies = vec![loaded.strategy.clone()];
    for path in rest {
        let adapter = match load_config(path) {
            Ok(a) => a,
            Err(code) => return code,
        };
        match build_strategy(&adapter) {
            Ok(s) => strategies.push(s),
            Err(e) => return fail(&e),
        }
    }
    let provider = CsvAdapter::new(resolve_data_dir(data_dir, &loaded.adapter));
    let symbols = match symbols_for(symbols, &loaded.adapter, &provider, &loaded.data.timeframe) {
        Ok(s) => s,
        Err(code) => return code,
    };
    run_screen_pipeline(&provider, &strategies, &symbols, &loaded.data)
}

/// Screen every symbol and print the matches. Succeeds when at least one
/// symbol was evaluated, even if none matched.
pub fn run_screen_pipeline(
    provider: &dyn MarketDataProvider,
    strategies: &[Strategy],
    symbols: &[String],
    data: &DataRequest,
) -> ExitCode {
    let outcomes = screen(provider, symbols, &data.timeframe, data.limit, strategies);
    let mut first_error: Option<ExitCode> = None;
    let (mut evaluated, mut matched) = (0, 0);
    for outcome in &outcomes {
        match &outcome.result {
            Ok(Some(hit)) => {
                evaluated += 1;
                matched += 1;
                println!("{}  {}  {}", outcome.symbol, hit.strategy, format_quote(&hit.quote));
            }
            Ok(None) => evaluated += 1,
            Err(e) => {
                eprintln!("warning: {} failed: {e}", outcome.symbol);
                first_error.get_or_insert_with(|| e.into());
            }
        }
    }
    eprintln!(
        "\n{matched} of {evaluated} symbol(s) matched ({} failed)",
        outcomes.len() - evaluated
    );
    match (evaluated, first_error) {
        (0, Some(code)) => code,
        _ => ExitCode::SUCCESS,
    }
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let loaded = match load_all(config_path) {
        Ok(l) => l,
        Err(code) => return code,
    };

    eprintln!("\nStrategy:  {}", loaded.strategy.description());
    eprintln!(
        "Backtest:  capital {:.2}, position size {}, commission {}",
        loaded.backtest.initial_capital, loaded.backtest.position_size, loaded.backtest.commission
    );
    eprintln!(
        "Risk:      max position {}, min notional {:.2}, stop {}, take profit {}",
        loaded.risk.max_position_fraction,
        loaded.risk.min_notional,
        loaded.risk.stop_loss_pct,
        loaded.risk.take_profit_pct
    );
    eprintln!(
        "Data:      timeframe {}, limit {}",
        loaded.data.timeframe, loaded.data.limit
    );
    if let Some(list) = loaded.adapter.get_string("data", "symbols") {
        if let Err(e) = parse_symbols(&list) {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
