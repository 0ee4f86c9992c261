pub mod candle;
pub mod replay;

// Re-export the Candle struct for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::Candle;
pub use replay::ReplaySource;
