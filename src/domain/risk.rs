//! Live-path risk manager: turns one raw signal plus an account snapshot
//! into a bounded order quantity.
//!
//! Rules, in order:
//! - Hold never executes.
//! - Buy tops the position up to `total_assets * max_position_fraction`,
//!   rejected when already at the cap or when the top-up notional is below
//!   `min_notional`.
//! - Sell liquidates the whole position, rejected when there is none.

use std::collections::BTreeMap;
use std::fmt;

use tracing::info;

use crate::domain::error::QuantsigError;
use crate::domain::position::Position;
use crate::domain::signal::Signal;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub max_position_fraction: f64,
    pub min_notional: f64,
    /// Fractional loss from entry that forces an exit; 0 disables.
    pub stop_loss_pct: f64,
    /// Fractional gain from entry that forces an exit; 0 disables.
    pub take_profit_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            max_position_fraction: 0.1,
            min_notional: 10.0,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.1,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), QuantsigError> {
        if !(self.max_position_fraction > 0.0 && self.max_position_fraction <= 1.0) {
            return Err(QuantsigError::invalid_parameter(
                "max_position_fraction",
                format!("must be in (0, 1], got {}", self.max_position_fraction),
            ));
        }
        for (name, value) in [
            ("min_notional", self.min_notional),
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(QuantsigError::invalid_parameter(
                    name,
                    format!("must be non-negative, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// Account state captured once per decision batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccountSnapshot {
    pub total_assets: f64,
    pub positions: BTreeMap<String, Position>,
}

impl AccountSnapshot {
    pub fn new(total_assets: f64) -> Self {
        Self {
            total_assets,
            positions: BTreeMap::new(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.insert(position.symbol.clone(), position);
        self
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol).filter(|p| p.is_open())
    }

    pub fn quantity(&self, symbol: &str) -> f64 {
        self.position(symbol).map(|p| p.quantity).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Hold,
    InvalidConfig,
    NoAssets,
    InvalidPrice,
    AtPositionCap,
    BelowMinNotional,
    NoPosition,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejection::Hold => "no signal",
            Rejection::InvalidConfig => "risk config out of range",
            Rejection::NoAssets => "account has no assets",
            Rejection::InvalidPrice => "price is not positive",
            Rejection::AtPositionCap => "position already at cap",
            Rejection::BelowMinNotional => "order below minimum notional",
            Rejection::NoPosition => "no position to sell",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskDecision {
    pub signal: Signal,
    pub execute: bool,
    pub quantity: f64,
    pub rejection: Option<Rejection>,
}

impl RiskDecision {
    fn approve(signal: Signal, quantity: f64) -> Self {
        Self {
            signal,
            execute: true,
            quantity,
            rejection: None,
        }
    }

    fn reject(signal: Signal, rejection: Rejection) -> Self {
        Self {
            signal,
            execute: false,
            quantity: 0.0,
            rejection: Some(rejection),
        }
    }
}

pub fn evaluate(
    signal: Signal,
    symbol: &str,
    current_price: f64,
    account: &AccountSnapshot,
    config: &RiskConfig,
) -> RiskDecision {
    let decision = decide(signal, symbol, current_price, account, config);
    if let Some(reason) = decision.rejection.filter(|r| *r != Rejection::Hold) {
        info!(symbol, signal = signal.label(), %reason, "order rejected");
    }
    decision
}

fn decide(
    signal: Signal,
    symbol: &str,
    price: f64,
    account: &AccountSnapshot,
    config: &RiskConfig,
) -> RiskDecision {
    let held = account.quantity(symbol);
    match signal {
        Signal::Hold => RiskDecision::reject(signal, Rejection::Hold),
        _ if config.validate().is_err() => RiskDecision::reject(signal, Rejection::InvalidConfig),
        Signal::Sell if held <= 0.0 => RiskDecision::reject(signal, Rejection::NoPosition),
        Signal::Sell => RiskDecision::approve(signal, held),
        Signal::Buy => {
            if !(account.total_assets > 0.0) {
                return RiskDecision::reject(signal, Rejection::NoAssets);
            }
            if !(price.is_finite() && price > 0.0) {
                return RiskDecision::reject(signal, Rejection::InvalidPrice);
            }
            let cap = account.total_assets * config.max_position_fraction;
            let position_value = held * price;
            if position_value >= cap {
                return RiskDecision::reject(signal, Rejection::AtPositionCap);
            }
            let quantity = (cap - position_value) / price;
            if !quantity.is_finite() {
                return RiskDecision::reject(signal, Rejection::InvalidPrice);
            }
            if quantity * price < config.min_notional {
                return RiskDecision::reject(signal, Rejection::BelowMinNotional);
            }
            RiskDecision::approve(signal, quantity)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    StopLoss,
    TakeProfit,
}

/// Stop-loss or take-profit hit by `price` for an open position.
pub fn protective_exit(
    position: Option<&Position>,
    price: f64,
    config: &RiskConfig,
) -> Option<ExitTrigger> {
    let change = position.filter(|p| p.is_open())?.return_at(price)?;
    if config.stop_loss_pct > 0.0 && change <= -config.stop_loss_pct {
        Some(ExitTrigger::StopLoss)
    } else if config.take_profit_pct > 0.0 && change >= config.take_profit_pct {
        Some(ExitTrigger::TakeProfit)
    } else {
        None
    }
}
