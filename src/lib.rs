//! G Coin Library
//!
//! Simulated G Coin exchange: synthetic price feed, fixed-duration
//! ABOVE/BELOW positions, subscription mining and an operator treasury.

pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod market;
pub mod persistence;
pub mod scheduler;
pub mod settlement;
pub mod types;

#[cfg(feature = "dashboard")]
pub mod dashboard;

pub use error::{LedgerError, LedgerResult};
pub use exchange::{Exchange, ExchangeConfig, ExchangeEvent};
