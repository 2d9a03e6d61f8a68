//! Cointrend Trading Engine Library
//!
//! Market analysis and order sizing for a spot crypto trading bot: price
//! series summaries, outlier tagging, a market-wide rating, coin ranking,
//! exchange-legal order quantities and the sell/hold decision.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
