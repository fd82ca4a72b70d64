//! Market data port trait.

use crate::domain::error::QuantsigError;
use crate::domain::series::BarSeries;

pub trait MarketDataProvider {
    /// The most recent `limit` bars of `symbol` at `timeframe` (e.g. `1d`,
    /// `1h`), oldest first. Providers may return an empty series instead of
    /// an error when nothing is available; callers treat both as no data.
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<BarSeries, QuantsigError>;
}
