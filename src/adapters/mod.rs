//! Concrete adapter implementations of the port traits.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod rest_price_adapter;
pub mod text_report_adapter;
