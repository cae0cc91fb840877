//! Synthetic market feed
//!
//! A bounded random walk over a single price plus the rolling chart history.

mod generator;
mod history;

pub use generator::{PriceGenerator, PriceGeneratorConfig};
pub use history::PriceHistory;
