use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{ClientError, Context};

use super::session::{RetryPolicy, Session};
use super::FetchResult;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
const SMA_SERIES_KEY: &str = "Technical Analysis: SMA";

/// Sampling interval between two consecutive indicator points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmaInterval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    SixtyMinutes,
    Daily,
    Weekly,
    Monthly,
}

impl SmaInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmaInterval::OneMinute => "1min",
            SmaInterval::FiveMinutes => "5min",
            SmaInterval::FifteenMinutes => "15min",
            SmaInterval::ThirtyMinutes => "30min",
            SmaInterval::SixtyMinutes => "60min",
            SmaInterval::Daily => "daily",
            SmaInterval::Weekly => "weekly",
            SmaInterval::Monthly => "monthly",
        }
    }
}

/// Price series the moving average is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesType {
    Open,
    High,
    Low,
    Close,
}

impl SeriesType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesType::Open => "open",
            SeriesType::High => "high",
            SeriesType::Low => "low",
            SeriesType::Close => "close",
        }
    }
}

/// One indicator point as the provider encodes it. The value arrives as a
/// decimal string and stays one until a normalizer parses it.
#[derive(Debug, Clone, Deserialize)]
pub struct SmaEntry {
    #[serde(rename = "SMA")]
    pub sma: String,
}

#[derive(Deserialize)]
struct SmaResponse {
    #[serde(rename = "Technical Analysis: SMA")]
    series: Option<IndexMap<String, SmaEntry>>,
}

/// Stateless client for the market-data indicator endpoint. Each call is one
/// GET request; the API key is the only credential.
pub struct MarketDataClient {
    session: Session,
    base_url: String,
    api_key: String,
}

impl MarketDataClient {
    pub fn new<K: Into<String>>(api_key: K) -> FetchResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url<K, U>(api_key: K, base_url: U) -> FetchResult<Self>
    where
        K: Into<String>,
        U: Into<String>,
    {
        let base_url = base_url.into();

        Ok(Self {
            session: Session::new(RetryPolicy::default())?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Fetch the provider-computed simple moving average series for a ticker,
    /// keyed by date string, in the provider's default range. Provider order
    /// is preserved (most recent first).
    pub fn get_moving_average(
        &self,
        ticker: &str,
        interval: SmaInterval,
        period: u32,
        series_type: SeriesType,
    ) -> FetchResult<IndexMap<String, SmaEntry>> {
        let url = format!(
            "{}/query?function=SMA&symbol={}&interval={}&time_period={}&series_type={}&apikey={}",
            self.base_url,
            ticker,
            interval.as_str(),
            period,
            series_type.as_str(),
            self.api_key
        );

        log::debug!("Requesting SMA series for {}", ticker);

        let body = self
            .session
            .get(&url)?
            .text()
            .with_context(|| format!("Failed to read SMA response for {}", ticker))?;

        parse_sma_response(&body)
    }
}

/// An error payload from the provider carries no indicator series; surface
/// the missing key instead of handing back an empty map.
fn parse_sma_response(body: &str) -> FetchResult<IndexMap<String, SmaEntry>> {
    let parsed: SmaResponse = serde_json::from_str(body)?;

    parsed
        .series
        .ok_or_else(|| ClientError::ResponseShape(SMA_SERIES_KEY.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sma_payload_preserving_provider_order() {
        let sample = r#"{
            "Meta Data": {
                "1: Symbol": "AAPL",
                "2: Indicator": "Simple Moving Average (SMA)"
            },
            "Technical Analysis: SMA": {
                "2020-03-18": {"SMA": "262.2340"},
                "2020-03-17": {"SMA": "265.5110"},
                "2020-03-16": {"SMA": "268.9010"}
            }
        }"#;

        let series = parse_sma_response(sample).unwrap();

        assert_eq!(series.len(), 3);
        let dates: Vec<&String> = series.keys().collect();
        assert_eq!(dates, ["2020-03-18", "2020-03-17", "2020-03-16"]);
        assert_eq!(series["2020-03-17"].sma, "265.5110");
    }

    #[test]
    fn error_payload_surfaces_missing_series_key() {
        let sample = r#"{"Error Message": "Invalid API call."}"#;

        match parse_sma_response(sample) {
            Err(ClientError::ResponseShape(key)) => {
                assert_eq!(key, "Technical Analysis: SMA");
            }
            other => panic!("Expected ResponseShape error, got {:?}", other),
        }
    }

    #[test]
    fn interval_and_series_type_render_provider_strings() {
        assert_eq!(SmaInterval::OneMinute.as_str(), "1min");
        assert_eq!(SmaInterval::Daily.as_str(), "daily");
        assert_eq!(SeriesType::Close.as_str(), "close");
    }
}
