//! Batch indicator analysis and strategy screening.
//!
//! Both walk a symbol list through a [`MarketDataProvider`] and tag every
//! symbol with its own result; a failing feed never hides the others.

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::domain::error::QuantsigError;
use crate::domain::indicator::{IndicatorSpec, SignalRequest, calculate_all, signals_all};
use crate::domain::series::BarSeries;
use crate::domain::signal::Signal;
use crate::domain::strategy::{SIGNAL_COLUMN, Strategy};
use crate::ports::data_port::MarketDataProvider;

/// Latest bar plus its move from the bar before.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub bar_timestamp: NaiveDateTime,
    pub latest_price: f64,
    /// `None` with a single bar.
    pub price_change: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub volume: f64,
}

impl Quote {
    fn from_series(series: &BarSeries) -> Result<Self, QuantsigError> {
        let bars = series.bars();
        let last = bars.last().ok_or_else(|| QuantsigError::NoData {
            symbol: series.symbol().to_string(),
        })?;
        let prev = bars.len().checked_sub(2).map(|i| bars[i].close);
        Ok(Quote {
            bar_timestamp: last.timestamp,
            latest_price: last.close,
            price_change: prev.map(|p| last.close - p),
            price_change_pct: prev
                .map(|p| (last.close / p - 1.0) * 100.0)
                .filter(|v| v.is_finite()),
            volume: last.volume,
        })
    }
}

/// Latest value of every column one indicator produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorReading {
    pub indicator: String,
    pub values: Vec<(String, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub quote: Quote,
    pub indicators: Vec<IndicatorReading>,
    /// Latest value of each requested signal column; `None` while warming up.
    pub signals: Vec<(String, Option<Signal>)>,
}

#[derive(Debug)]
pub struct SymbolAnalysis {
    pub symbol: String,
    pub result: Result<Analysis, QuantsigError>,
}

fn analyze_symbol(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    timeframe: &str,
    limit: usize,
    specs: &[IndicatorSpec],
    signal_requests: &[SignalRequest],
) -> Result<Analysis, QuantsigError> {
    let series = provider.get_bars(symbol, timeframe, limit)?;
    let quote = Quote::from_series(&series)?;
    let computed = signals_all(&calculate_all(&series, specs)?, signal_requests)?;
    let last = computed.len() - 1;

    let mut indicators: Vec<IndicatorReading> = Vec::new();
    for spec in specs {
        let name = spec.description();
        if indicators.iter().any(|r| r.indicator == name) {
            continue;
        }
        let values = spec
            .output_columns()
            .into_iter()
            .map(|column| {
                let value = computed.value(&column, last);
                (column, value)
            })
            .collect();
        indicators.push(IndicatorReading {
            indicator: name,
            values,
        });
    }
    let signals = signal_requests
        .iter()
        .map(|request| {
            let column = request.column();
            let signal = computed.signal_at(&column, last);
            (column, signal)
        })
        .collect();
    Ok(Analysis {
        quote,
        indicators,
        signals,
    })
}

/// Quote, latest indicator values and latest signals for every symbol.
/// Indicators shared between `specs` and `signal_requests` are computed once.
pub fn analyze(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    timeframe: &str,
    limit: usize,
    specs: &[IndicatorSpec],
    signal_requests: &[SignalRequest],
) -> Vec<SymbolAnalysis> {
    symbols
        .iter()
        .map(|symbol| {
            let result =
                analyze_symbol(provider, symbol, timeframe, limit, specs, signal_requests);
            match &result {
                Ok(a) => debug!(symbol = %symbol, price = a.quote.latest_price, "analyzed"),
                Err(e) => warn!(symbol = %symbol, error = %e, "analysis failed"),
            }
            SymbolAnalysis {
                symbol: symbol.clone(),
                result,
            }
        })
        .collect()
}

/// A symbol whose latest bar carries a buy signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenMatch {
    pub strategy: String,
    pub quote: Quote,
}

#[derive(Debug)]
pub struct SymbolScreen {
    pub symbol: String,
    /// `Ok(None)` when no strategy signals a buy on the latest bar.
    pub result: Result<Option<ScreenMatch>, QuantsigError>,
}

impl SymbolScreen {
    pub fn matched(&self) -> Option<&ScreenMatch> {
        self.result.as_ref().ok().and_then(Option::as_ref)
    }
}

fn screen_symbol(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    timeframe: &str,
    limit: usize,
    strategies: &[Strategy],
) -> Result<Option<ScreenMatch>, QuantsigError> {
    let series = provider.get_bars(symbol, timeframe, limit)?;
    let quote = Quote::from_series(&series)?;
    for strategy in strategies {
        let signaled = strategy.generate_signals(&series)?;
        if signaled.signal_at(SIGNAL_COLUMN, signaled.len() - 1) == Some(Signal::Buy) {
            return Ok(Some(ScreenMatch {
                strategy: strategy.name().to_string(),
                quote,
            }));
        }
    }
    Ok(None)
}

/// Keep the symbols where the first of `strategies`, in order, signals a
/// buy on the latest bar.
pub fn screen(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    timeframe: &str,
    limit: usize,
    strategies: &[Strategy],
) -> Vec<SymbolScreen> {
    symbols
        .iter()
        .map(|symbol| {
            let result = screen_symbol(provider, symbol, timeframe, limit, strategies);
            if let Err(e) = &result {
                warn!(symbol = %symbol, error = %e, "screen failed");
            }
            SymbolScreen {
                symbol: symbol.clone(),
                result,
            }
        })
        .collect()
}
