//! Core engine: the list → enrich → evaluate → alert loop.

pub mod criteria;
pub mod market_data;
pub mod monitor;
pub mod rate_limit;
pub mod scanner;
pub mod seen;
