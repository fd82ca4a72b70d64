//! Open positions and the append-only trade log.

use chrono::NaiveDateTime;

/// Long holding in one symbol. Quantities are fractional shares.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_entry_price: f64,
}

impl Position {
    pub fn new(symbol: impl Into<String>, quantity: f64, avg_entry_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_entry_price,
        }
    }

    pub fn is_open(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.avg_entry_price)
    }

    /// Fractional move of `price` from the entry price; `None` without a
    /// usable entry price.
    pub fn return_at(&self, price: f64) -> Option<f64> {
        (self.avg_entry_price > 0.0).then(|| price / self.avg_entry_price - 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fill. Sells carry the realized P&L against the matching entry cost
/// (entry fee included).
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub timestamp: NaiveDateTime,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub realized_pnl: Option<f64>,
    /// Realized P&L as a percentage of the entry notional.
    pub profit_pct: Option<f64>,
    /// Grid slot filled or drained, for grid backtests.
    pub grid_level: Option<usize>,
}

impl Trade {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }

    pub fn is_winner(&self) -> bool {
        matches!(self.realized_pnl, Some(pnl) if pnl > 0.0)
    }
}
