//! Core domain types and logic.

pub mod money;
pub mod instrument;
pub mod transaction;
pub mod price_cache;
pub mod builder;
pub mod windowing;
pub mod analyzer;
pub mod open_positions;
pub mod aggregation;
pub mod report;
pub mod error;
