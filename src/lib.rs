//! Chat Filter: rule-based filtering of customer-service chat records.

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod roster;
pub mod source;
pub mod tasks;
