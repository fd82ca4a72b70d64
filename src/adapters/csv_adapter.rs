//! CSV market data adapter.
//!
//! One file per symbol and timeframe, `<SYMBOL>_<TIMEFRAME>.csv`, with a
//! header row and columns `timestamp,open,high,low,close,volume`. The
//! timestamp is either a date (`2024-01-15`) or a date-time
//! (`2024-01-15 09:30:00` or `2024-01-15T09:30:00`).

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::domain::error::QuantsigError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::series::BarSeries;
use crate::ports::data_port::MarketDataProvider;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}_{timeframe}.csv"))
    }

    /// Symbols that have a file for `timeframe`, sorted.
    pub fn list_symbols(&self, timeframe: &str) -> Result<Vec<String>, QuantsigError> {
        let suffix = format!("_{timeframe}.csv");
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(&suffix) {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

fn malformed(path: &str, line: u64, reason: impl std::fmt::Display) -> QuantsigError {
    QuantsigError::MalformedSeries {
        reason: format!("{path} line {line}: {reason}"),
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_record(record: &csv::StringRecord, path: &str) -> Result<PriceBar, QuantsigError> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let field = |index: usize, name: &str| -> Result<f64, QuantsigError> {
        let raw = record
            .get(index)
            .ok_or_else(|| malformed(path, line, format!("missing {name} column")))?;
        raw.trim()
            .parse::<f64>()
            .map_err(|e| malformed(path, line, format!("invalid {name} value {raw:?}: {e}")))
    };

    let raw_ts = record
        .get(0)
        .ok_or_else(|| malformed(path, line, "missing timestamp column"))?;
    let timestamp = parse_timestamp(raw_ts)
        .ok_or_else(|| malformed(path, line, format!("invalid timestamp {raw_ts:?}")))?;

    Ok(PriceBar {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
    })
}

impl MarketDataProvider for CsvAdapter {
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<BarSeries, QuantsigError> {
        let path = self.csv_path(symbol, timeframe);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QuantsigError::NoData {
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let display = path.display().to_string();

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| QuantsigError::MalformedSeries {
                reason: format!("{display}: {e}"),
            })?;
            bars.push(parse_record(&record, &display)?);
        }

        bars.sort_by_key(|b| b.timestamp);
        let start = bars.len().saturating_sub(limit);
        let bars = bars.split_off(start);
        debug!(symbol, timeframe, bars = bars.len(), "loaded csv bars");
        BarSeries::new(symbol, bars)
    }
}
