pub mod engine_store;
pub mod market_feed;
