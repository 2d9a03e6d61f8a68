pub mod coin_ranker;
pub mod market_rating;
pub mod order_quantizer;
pub mod outlier_classifier;
pub mod sale_validator;
pub mod time_series_summarizer;
pub mod trend_model;
