//! Configuration access port trait.

use crate::domain::error::QuantsigError;

pub trait ConfigPort {
    /// Raw value, `None` when the key is absent or blank.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    /// `default` when absent; a value that is not an integer is `ConfigInvalid`.
    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, QuantsigError>;
    /// `default` when absent; a value that is not a finite number is `ConfigInvalid`.
    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, QuantsigError>;
}
