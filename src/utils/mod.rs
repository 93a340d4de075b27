pub mod time;

pub use time::analysis_date_range;
