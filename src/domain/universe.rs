//! Symbol lists for batch backtests and decision batches.
//!
//! Lists are comma separated, e.g. `BTCUSDT, ethusdt,AAPL`. Symbols are
//! trimmed and uppercased; order is preserved.

use std::collections::HashSet;

use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("no symbols given (pass --symbols or set [data] symbols)")]
    NoSymbols,
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    if input.trim().is_empty() {
        return Err(UniverseError::NoSymbols);
    }

    let mut symbols = Vec::new();
    let mut seen = HashSet::new();
    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }
    Ok(symbols)
}

/// Symbols from an explicit list when given, else from `[data] symbols`.
pub fn resolve_symbols(
    explicit: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, UniverseError> {
    match explicit {
        Some(list) => parse_symbols(list),
        None => match config.get_string("data", "symbols") {
            Some(list) => parse_symbols(&list),
            None => Err(UniverseError::NoSymbols),
        },
    }
}
