//! Account information port trait.

use crate::domain::error::QuantsigError;
use crate::domain::risk::AccountSnapshot;

pub trait AccountInfoProvider {
    /// Total assets and per-symbol positions, captured at call time.
    fn get_account_snapshot(&self) -> Result<AccountSnapshot, QuantsigError>;
}
