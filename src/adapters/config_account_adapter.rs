//! Account snapshot read from the `[account]` config section.
//!
//! ```ini
//! [account]
//! total_assets = 100000
//! positions = BTCUSDT:0.5@42000, AAPL:10@180.25
//! ```

use crate::domain::error::QuantsigError;
use crate::domain::position::Position;
use crate::domain::risk::AccountSnapshot;
use crate::ports::account_port::AccountInfoProvider;
use crate::ports::config_port::ConfigPort;

pub struct ConfigAccountAdapter<'a> {
    config: &'a dyn ConfigPort,
}

impl<'a> ConfigAccountAdapter<'a> {
    pub fn new(config: &'a dyn ConfigPort) -> Self {
        Self { config }
    }
}

fn invalid_positions(reason: String) -> QuantsigError {
    QuantsigError::ConfigInvalid {
        section: "account".to_string(),
        key: "positions".to_string(),
        reason,
    }
}

/// Parse one `SYMBOL:QUANTITY@PRICE` entry.
fn parse_position(entry: &str) -> Result<Position, QuantsigError> {
    let (symbol, rest) = entry
        .split_once(':')
        .ok_or_else(|| invalid_positions(format!("expected SYMBOL:QTY@PRICE, got {entry:?}")))?;
    let (qty, price) = rest
        .split_once('@')
        .ok_or_else(|| invalid_positions(format!("missing @PRICE in {entry:?}")))?;

    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(invalid_positions(format!("empty symbol in {entry:?}")));
    }
    let quantity: f64 = qty
        .trim()
        .parse()
        .map_err(|_| invalid_positions(format!("bad quantity in {entry:?}")))?;
    let price: f64 = price
        .trim()
        .parse()
        .map_err(|_| invalid_positions(format!("bad price in {entry:?}")))?;
    if !(quantity.is_finite() && quantity >= 0.0 && price.is_finite() && price > 0.0) {
        return Err(invalid_positions(format!(
            "quantity must be non-negative and price positive in {entry:?}"
        )));
    }
    Ok(Position::new(symbol, quantity, price))
}

impl AccountInfoProvider for ConfigAccountAdapter<'_> {
    fn get_account_snapshot(&self) -> Result<AccountSnapshot, QuantsigError> {
        let raw_assets = self.config.get_string("account", "total_assets").ok_or_else(|| {
            QuantsigError::ConfigMissing {
                section: "account".to_string(),
                key: "total_assets".to_string(),
            }
        })?;
        let total_assets: f64 = raw_assets
            .trim()
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| QuantsigError::ConfigInvalid {
                section: "account".to_string(),
                key: "total_assets".to_string(),
                reason: format!("expected a non-negative number, got {raw_assets:?}"),
            })?;

        let mut snapshot = AccountSnapshot::new(total_assets);
        if let Some(list) = self.config.get_string("account", "positions") {
            for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                snapshot = snapshot.with_position(parse_position(entry)?);
            }
        }
        Ok(snapshot)
    }
}
