//! Bar series: an ordered run of price bars plus named numeric columns.
//!
//! A column holds one `Option<f64>` per bar; `None` means "no value" (warm-up
//! or not computable) and is kept distinct from zero. Pipeline stages never
//! mutate a caller's series: they take `&BarSeries` and return a new one.

use crate::domain::error::QuantsigError;
use crate::domain::ohlcv::{PriceBar, PriceField};
use crate::domain::signal::Signal;

pub type Column = Vec<Option<f64>>;

#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<PriceBar>,
    columns: Vec<(String, Column)>,
}

impl BarSeries {
    /// Build a series, checking strictly ascending timestamps and finite prices.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, QuantsigError> {
        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_finite() {
                return Err(QuantsigError::MalformedSeries {
                    reason: format!("non-finite value in bar {i}"),
                });
            }
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(QuantsigError::MalformedSeries {
                    reason: format!(
                        "timestamps not strictly ascending at bar {i} ({} after {})",
                        bar.timestamp,
                        bars[i - 1].timestamp
                    ),
                });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
            columns: Vec::new(),
        })
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_bar(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn require_column(&self, name: &str) -> Result<&[Option<f64>], QuantsigError> {
        self.column(name).ok_or_else(|| QuantsigError::MissingColumn {
            column: name.to_string(),
        })
    }

    pub fn value(&self, name: &str, index: usize) -> Option<f64> {
        self.column(name)
            .and_then(|values| values.get(index).copied())
            .flatten()
    }

    /// Signal stored in `name` at `index`; `None` during warm-up.
    pub fn signal_at(&self, name: &str, index: usize) -> Option<Signal> {
        self.value(name, index).and_then(Signal::from_value)
    }

    /// Return a new series with `name` set (replacing any existing column).
    /// Non-finite values are normalized to "no value".
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Column,
    ) -> Result<Self, QuantsigError> {
        let name = name.into();
        if values.len() != self.bars.len() {
            return Err(QuantsigError::MalformedSeries {
                reason: format!(
                    "column {name} has {} values for {} bars",
                    values.len(),
                    self.bars.len()
                ),
            });
        }
        let values: Column = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name, values)),
        }
        Ok(self)
    }

    pub fn prices(&self, field: PriceField) -> Column {
        self.bars.iter().map(|b| Some(b.price(field))).collect()
    }

    pub fn volumes(&self) -> Column {
        self.bars.iter().map(|b| Some(b.volume)).collect()
    }

    /// Keep only the most recent `limit` bars (columns are trimmed alongside).
    pub fn tail(&self, limit: usize) -> Self {
        let start = self.bars.len().saturating_sub(limit);
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[start..].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(n, v)| (n.clone(), v[start..].to_vec()))
                .collect(),
        }
    }
}
