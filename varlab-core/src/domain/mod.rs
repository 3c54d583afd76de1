//! Domain types: samples and backtest records.

pub mod result;
pub mod sample;

pub use result::BacktestResult;
pub use sample::{Sample, SampleKey};
