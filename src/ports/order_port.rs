//! Order execution port trait.

use crate::domain::decision::OrderRequest;
use crate::domain::error::QuantsigError;

pub trait OrderExecutor {
    /// Submit one order and return the venue's order id.
    fn submit(&mut self, order: &OrderRequest) -> Result<String, QuantsigError>;
}
