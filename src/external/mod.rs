pub mod fmp;
pub mod fundamentals_source;
