pub mod balance;
pub mod coin;
pub mod market;
pub mod order;
pub mod time_series;
