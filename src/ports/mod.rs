//! Port traits: the boundaries the engine consumes and produces through.

pub mod config_port;
pub mod price_source;
pub mod report_sink;
pub mod transaction_source;
