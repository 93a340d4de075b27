pub mod candles;
pub mod indicators;

pub use candles::{candles_to_table, CandleRow, CandleTable, PriceField};
pub use indicators::{average_volume, build_sma_table, pivots, PivotPoint, SmaRow, SmaTable};
