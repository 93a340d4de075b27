use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use indexmap::IndexMap;

use crate::error::{ClientError, Result};
use crate::fetch::brokerage::Candle;

/// Columns of a candle table selectable by the indicator helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Open,
    Close,
    Low,
    High,
    Volume,
    Vwap,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::Close => "close",
            PriceField::Low => "low",
            PriceField::High => "high",
            PriceField::Volume => "volume",
            PriceField::Vwap => "VWAP",
        }
    }
}

/// One candle flattened for analysis, with the calendar date and clock time
/// split out of the period end.
#[derive(Debug, Clone)]
pub struct CandleRow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub open: f64,
    pub close: f64,
    pub low: f64,
    pub high: f64,
    pub volume: u64,
    pub vwap: f64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Candle rows in input order, plus any derived indicator columns keyed by
/// name.
#[derive(Debug, Clone, Default)]
pub struct CandleTable {
    rows: Vec<CandleRow>,
    derived: IndexMap<String, Vec<Option<f64>>>,
}

/// Map raw candles into table rows. Input order is preserved.
pub fn candles_to_table(candles: &[Candle]) -> CandleTable {
    let rows = candles
        .iter()
        .map(|candle| CandleRow {
            start: candle.start,
            end: candle.end,
            open: candle.open,
            close: candle.close,
            low: candle.low,
            high: candle.high,
            volume: candle.volume,
            vwap: candle.vwap,
            date: candle.end.date_naive(),
            time: candle.end.time(),
        })
        .collect();

    CandleTable {
        rows,
        derived: IndexMap::new(),
    }
}

impl CandleTable {
    pub fn rows(&self) -> &[CandleRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column values in row order. Volume is widened to float so every
    /// column feeds the same numeric helpers.
    pub fn values(&self, field: PriceField) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| match field {
                PriceField::Open => row.open,
                PriceField::Close => row.close,
                PriceField::Low => row.low,
                PriceField::High => row.high,
                PriceField::Volume => row.volume as f64,
                PriceField::Vwap => row.vwap,
            })
            .collect()
    }

    pub fn derived_column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.derived.get(name).map(Vec::as_slice)
    }

    pub fn derived_column_names(&self) -> impl Iterator<Item = &str> {
        self.derived.keys().map(String::as_str)
    }

    /// Return a copy of the table with a trailing simple moving average
    /// column appended for each window, named `{field}_SMA_{window}`. The
    /// first `window - 1` entries of a column are empty; a trailing window
    /// has nothing to average there. The receiver is left untouched.
    pub fn with_sma_columns(&self, field: PriceField, windows: &[usize]) -> Result<CandleTable> {
        let values = self.values(field);
        let mut table = self.clone();

        for &window in windows {
            if window == 0 {
                return Err(ClientError::message(
                    "Moving average window must be at least one period",
                ));
            }

            let label = format!("{}_SMA_{}", field.as_str(), window);
            table.derived.insert(label, trailing_sma(&values, window));
        }

        Ok(table)
    }
}

fn trailing_sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(index, _)| {
            if index + 1 < window {
                None
            } else {
                let sum: f64 = values[index + 1 - window..=index].iter().sum();
                Some(sum / window as f64)
            }
        })
        .collect()
}
