//! Danish tax on US equity compensation: exchange rates, share lots, capital gains,
//! dividends and income tax.

pub mod core;
pub mod frankfurter;
pub mod storage;
pub mod utils;
