//! Batch live decisions.
//!
//! For each symbol: fetch recent bars, generate the strategy signal, read the
//! latest bar's signal and close, escalate to a sell when a protective
//! stop-loss or take-profit is hit, then size through the risk manager. The
//! account snapshot is taken once by the caller and shared read-only by every
//! symbol in the batch.

use std::fmt;
use std::time::Instant;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::domain::error::QuantsigError;
use crate::domain::risk::{
    self, AccountSnapshot, ExitTrigger, Rejection, RiskConfig, protective_exit,
};
use crate::domain::signal::Signal;
use crate::domain::strategy::{SIGNAL_COLUMN, Strategy};
use crate::ports::data_port::MarketDataProvider;
use crate::ports::order_port::OrderExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderType {
    #[default]
    Market,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
}

/// Where the bars for a decision batch come from.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    pub timeframe: String,
    pub limit: usize,
}

impl Default for DataRequest {
    fn default() -> Self {
        Self {
            timeframe: "1d".to_string(),
            limit: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub symbol: String,
    pub strategy: String,
    /// Strategy signal on the latest bar; `None` while still warming up.
    pub raw_signal: Option<Signal>,
    /// Signal after protective exits were applied.
    pub signal: Signal,
    pub trigger: Option<ExitTrigger>,
    pub current_price: f64,
    pub bar_timestamp: NaiveDateTime,
    pub execute: bool,
    pub quantity: f64,
    pub rejection: Option<Rejection>,
    /// When the decision was made.
    pub timestamp: NaiveDateTime,
}

impl Decision {
    pub fn side(&self) -> Option<OrderSide> {
        match self.signal {
            Signal::Buy => Some(OrderSide::Buy),
            Signal::Sell => Some(OrderSide::Sell),
            Signal::Hold => None,
        }
    }

    /// Market order for an executable decision.
    pub fn to_order_request(&self) -> Option<OrderRequest> {
        if !(self.execute && self.quantity.is_finite() && self.quantity > 0.0) {
            return None;
        }
        Some(OrderRequest {
            symbol: self.symbol.clone(),
            side: self.side()?,
            quantity: self.quantity,
            order_type: OrderType::Market,
        })
    }
}

/// Per-symbol outcome of a batch.
#[derive(Debug)]
pub enum SymbolOutcome {
    Decided(Decision),
    Failed { symbol: String, error: QuantsigError },
    /// The deadline passed before this symbol was evaluated.
    Cancelled { symbol: String },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Decided(d) => &d.symbol,
            SymbolOutcome::Failed { symbol, .. } | SymbolOutcome::Cancelled { symbol } => symbol,
        }
    }

    pub fn decision(&self) -> Option<&Decision> {
        match self {
            SymbolOutcome::Decided(d) => Some(d),
            _ => None,
        }
    }
}

fn decide_symbol(
    provider: &dyn MarketDataProvider,
    account: &AccountSnapshot,
    strategy: &Strategy,
    symbol: &str,
    data: &DataRequest,
    risk_config: &RiskConfig,
    now: NaiveDateTime,
) -> Result<Decision, QuantsigError> {
    risk_config.validate()?;
    let series = provider.get_bars(symbol, &data.timeframe, data.limit)?;
    let Some(last) = series.last_bar().cloned() else {
        return Err(QuantsigError::NoData {
            symbol: symbol.to_string(),
        });
    };

    let signaled = strategy.generate_signals(&series)?;
    let raw_signal = signaled.signal_at(SIGNAL_COLUMN, signaled.len() - 1);
    let trigger = protective_exit(account.position(symbol), last.close, risk_config);
    let signal = match trigger {
        Some(_) => Signal::Sell,
        None => raw_signal.unwrap_or(Signal::Hold),
    };
    if let Some(trigger) = trigger {
        info!(symbol, ?trigger, price = last.close, "protective exit");
    }

    let verdict = risk::evaluate(signal, symbol, last.close, account, risk_config);
    Ok(Decision {
        symbol: symbol.to_string(),
        strategy: strategy.name().to_string(),
        raw_signal,
        signal,
        trigger,
        current_price: last.close,
        bar_timestamp: last.timestamp,
        execute: verdict.execute,
        quantity: verdict.quantity,
        rejection: verdict.rejection,
        timestamp: now,
    })
}

/// Decide every symbol against one account snapshot. `now` stamps each
/// decision; once `deadline` has passed, the remaining symbols are returned
/// as cancelled without being fetched.
#[allow(clippy::too_many_arguments)]
pub fn make_decisions(
    provider: &dyn MarketDataProvider,
    account: &AccountSnapshot,
    strategy: &Strategy,
    symbols: &[String],
    data: &DataRequest,
    risk_config: &RiskConfig,
    now: NaiveDateTime,
    deadline: Option<Instant>,
) -> Vec<SymbolOutcome> {
    let mut outcomes = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!(symbol = %symbol, "deadline passed, symbol cancelled");
            outcomes.push(SymbolOutcome::Cancelled {
                symbol: symbol.clone(),
            });
            continue;
        }
        match decide_symbol(provider, account, strategy, symbol, data, risk_config, now) {
            Ok(decision) => {
                debug!(
                    symbol = %symbol,
                    signal = decision.signal.label(),
                    execute = decision.execute,
                    quantity = decision.quantity,
                    "decision made"
                );
                outcomes.push(SymbolOutcome::Decided(decision));
            }
            Err(error) => {
                warn!(symbol = %symbol, %error, "decision failed");
                outcomes.push(SymbolOutcome::Failed {
                    symbol: symbol.clone(),
                    error,
                });
            }
        }
    }
    outcomes
}

#[derive(Debug)]
pub struct ExecutionReport {
    pub order: OrderRequest,
    pub result: Result<String, QuantsigError>,
}

/// Submit every executable decision in order. A rejected order does not stop
/// the rest.
pub fn execute_decisions(
    executor: &mut dyn OrderExecutor,
    decisions: &[Decision],
) -> Vec<ExecutionReport> {
    decisions
        .iter()
        .filter_map(Decision::to_order_request)
        .map(|order| {
            let result = executor.submit(&order);
            if let Err(e) = &result {
                warn!(symbol = %order.symbol, side = %order.side, error = %e, "order failed");
            }
            ExecutionReport { order, result }
        })
        .collect()
}
