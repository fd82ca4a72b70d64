//! Port traits for the collaborators outside the core.

pub mod account_port;
pub mod config_port;
pub mod data_port;
pub mod order_port;
