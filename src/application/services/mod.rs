pub mod trading_engine;
