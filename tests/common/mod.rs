#![allow(dead_code)]

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use quantsig::domain::decision::OrderRequest;
use quantsig::domain::error::QuantsigError;
pub use quantsig::domain::ohlcv::PriceBar;
use quantsig::domain::position::Position;
use quantsig::domain::risk::AccountSnapshot;
use quantsig::domain::series::BarSeries;
use quantsig::domain::strategy::SIGNAL_COLUMN;
use quantsig::ports::account_port::AccountInfoProvider;
use quantsig::ports::data_port::MarketDataProvider;
use quantsig::ports::order_port::OrderExecutor;

/// In-memory market data keyed by symbol; `limit` keeps the most recent bars.
pub struct MockDataProvider {
    pub data: HashMap<String, BarSeries>,
    pub errors: HashMap<String, String>,
}

impl MockDataProvider {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, series: BarSeries) -> Self {
        self.data.insert(series.symbol().to_string(), series);
        self
    }

    pub fn with_closes(self, symbol: &str, closes: &[f64]) -> Self {
        self.with_series(series_from_closes(symbol, closes))
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataProvider for MockDataProvider {
    fn get_bars(
        &self,
        symbol: &str,
        _timeframe: &str,
        limit: usize,
    ) -> Result<BarSeries, QuantsigError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(QuantsigError::MalformedSeries {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|s| s.tail(limit))
            .unwrap_or_else(|| BarSeries::empty(symbol)))
    }
}

pub struct MockAccount {
    pub snapshot: AccountSnapshot,
}

impl MockAccount {
    pub fn new(total_assets: f64) -> Self {
        Self {
            snapshot: AccountSnapshot::new(total_assets),
        }
    }

    pub fn holding(mut self, symbol: &str, quantity: f64, avg_price: f64) -> Self {
        self.snapshot = self
            .snapshot
            .with_position(Position::new(symbol, quantity, avg_price));
        self
    }
}

impl AccountInfoProvider for MockAccount {
    fn get_account_snapshot(&self) -> Result<AccountSnapshot, QuantsigError> {
        Ok(self.snapshot.clone())
    }
}

/// Records orders; symbols listed in `reject` fail.
#[derive(Default)]
pub struct RecordingExecutor {
    pub orders: Vec<OrderRequest>,
    pub reject: Vec<String>,
}

impl OrderExecutor for RecordingExecutor {
    fn submit(&mut self, order: &OrderRequest) -> Result<String, QuantsigError> {
        if self.reject.contains(&order.symbol) {
            return Err(QuantsigError::InvalidParameter {
                name: "symbol".into(),
                reason: format!("{} rejected by broker", order.symbol),
            });
        }
        self.orders.push(order.clone());
        Ok(format!("order-{}", self.orders.len()))
    }
}

pub fn day(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i as i64)
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> PriceBar {
    PriceBar {
        timestamp: day(i),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Daily bars with open = high = low = close and constant volume.
pub fn series_from_closes(symbol: &str, closes: &[f64]) -> BarSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c, c, c, c, 1000.0))
        .collect();
    BarSeries::new(symbol, bars).unwrap()
}

/// `n` closes rising linearly from `start` to `end` inclusive.
pub fn linear(start: f64, end: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
        .collect()
}

/// Deterministic zig-zag around `base`, enough to trigger crosses.
pub fn oscillating(base: f64, amplitude: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| base + amplitude * ((i as f64) * 0.35).sin() + (i % 3) as f64 * 0.1)
        .collect()
}

/// `series` plus a signal column with the given (index, value) entries and 0
/// elsewhere.
pub fn with_signals(series: BarSeries, signals: &[(usize, f64)]) -> BarSeries {
    let mut column = vec![Some(0.0); series.len()];
    for &(i, s) in signals {
        column[i] = Some(s);
    }
    series.with_column(SIGNAL_COLUMN, column).unwrap()
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
