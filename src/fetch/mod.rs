use crate::error::Result;

pub mod brokerage;
pub mod marketdata;
pub mod session;

pub use brokerage::{
    AccessToken, BrokerageClient, Candle, CandleGranularity, DEFAULT_API_VERSION,
};
pub use marketdata::{MarketDataClient, SeriesType, SmaEntry, SmaInterval};
pub use session::{RetryPolicy, Session};

pub type FetchResult<T> = Result<T>;
