//! Cash, inventory slots and equity tracking for one simulated symbol.
//!
//! Inventory lives in a fixed array of slots allocated up front. The plain
//! backtest uses a single slot (flat or long, never pyramided); the grid
//! backtest uses one slot per grid level. Buys fill the lowest empty slot,
//! sells drain the lowest filled one.

use chrono::NaiveDateTime;

use super::position::{Position, Trade, TradeSide};

/// Shares bought into one slot, with the cash paid for them (fee included).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lot {
    pub quantity: f64,
    pub entry_price: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    pub position_value: f64,
    pub equity: f64,
}

/// Result of an entry attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryResult {
    Filled { slot: usize, quantity: f64, cost: f64 },
    InsufficientCapital,
    NoFreeSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub symbol: String,
    pub initial_capital: f64,
    pub cash: f64,
    slots: Box<[Option<Lot>]>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    /// Portfolio with `slots` inventory slots (at least one).
    pub fn new(symbol: impl Into<String>, initial_capital: f64, slots: usize) -> Self {
        Portfolio {
            symbol: symbol.into(),
            initial_capital,
            cash: initial_capital,
            slots: vec![None; slots.max(1)].into_boxed_slice(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn lot(&self, slot: usize) -> Option<&Lot> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn filled_slots(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_flat(&self) -> bool {
        self.filled_slots() == 0
    }

    /// Aggregate holding across all slots.
    pub fn position(&self) -> Option<Position> {
        let quantity: f64 = self.slots.iter().flatten().map(|l| l.quantity).sum();
        if quantity <= 0.0 {
            return None;
        }
        let notional: f64 = self
            .slots
            .iter()
            .flatten()
            .map(|l| l.quantity * l.entry_price)
            .sum();
        Some(Position::new(self.symbol.clone(), quantity, notional / quantity))
    }

    pub fn position_value(&self, price: f64) -> f64 {
        self.slots.iter().flatten().map(|l| l.quantity * price).sum()
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position_value(price)
    }

    /// Buy `quantity` at `price` into the lowest empty slot. Commission is a
    /// fraction of the notional added to the cost.
    pub fn open_lot(
        &mut self,
        timestamp: NaiveDateTime,
        price: f64,
        quantity: f64,
        commission: f64,
    ) -> EntryResult {
        let Some(slot) = self.slots.iter().position(Option::is_none) else {
            return EntryResult::NoFreeSlot;
        };
        let notional = quantity * price;
        let fee = notional * commission;
        let cost = notional + fee;
        // all-in sizing can overshoot cash by rounding
        if !(quantity > 0.0 && cost.is_finite()) || cost > self.cash * (1.0 + 1e-12) {
            return EntryResult::InsufficientCapital;
        }

        self.cash = (self.cash - cost).max(0.0);
        self.slots[slot] = Some(Lot {
            quantity,
            entry_price: price,
            cost,
        });
        self.trades.push(Trade {
            timestamp,
            side: TradeSide::Buy,
            quantity,
            price,
            fee,
            realized_pnl: None,
            profit_pct: None,
            grid_level: (self.slots.len() > 1).then_some(slot),
        });
        EntryResult::Filled {
            slot,
            quantity,
            cost,
        }
    }

    /// Sell the whole lowest filled slot at `price`. `None` when flat.
    pub fn close_lowest(
        &mut self,
        timestamp: NaiveDateTime,
        price: f64,
        commission: f64,
    ) -> Option<&Trade> {
        let slot = self.slots.iter().position(Option::is_some)?;
        let lot = self.slots[slot].take()?;

        let notional = lot.quantity * price;
        let fee = notional * commission;
        let proceeds = notional - fee;
        let pnl = proceeds - lot.cost;
        let entry_notional = lot.quantity * lot.entry_price;

        self.cash += proceeds;
        self.trades.push(Trade {
            timestamp,
            side: TradeSide::Sell,
            quantity: lot.quantity,
            price,
            fee,
            realized_pnl: Some(pnl),
            profit_pct: (entry_notional > 0.0).then(|| pnl / entry_notional * 100.0),
            grid_level: (self.slots.len() > 1).then_some(slot),
        });
        self.trades.last()
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, price: f64) {
        let position_value = self.position_value(price);
        self.equity_curve.push(EquityPoint {
            timestamp,
            cash: self.cash,
            position_value,
            equity: self.cash + position_value,
        });
    }
}
