use indexmap::IndexMap;

use crate::error::{ClientError, Result};
use crate::fetch::marketdata::SmaEntry;

/// Extremum over a lookback window, together with how many periods ago it
/// occurred. Inputs are ordered most-recent-first, so an offset of 0 is the
/// current period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotPoint {
    pub value: f64,
    pub periods_ago: usize,
}

/// Support (lowest low) and resistance (highest high) over the first
/// `n_periods` entries of the two series. When an extremum repeats, the
/// earliest offset wins.
pub fn pivots(lows: &[f64], highs: &[f64], n_periods: usize) -> Result<(PivotPoint, PivotPoint)> {
    if n_periods == 0 {
        return Err(ClientError::message(
            "Pivot lookback must be at least one period",
        ));
    }

    let support = extremum(lows, n_periods, |candidate, best| candidate < best)?;
    let resistance = extremum(highs, n_periods, |candidate, best| candidate > best)?;

    Ok((support, resistance))
}

fn extremum<F>(values: &[f64], n_periods: usize, better: F) -> Result<PivotPoint>
where
    F: Fn(f64, f64) -> bool,
{
    if values.len() < n_periods {
        return Err(ClientError::InsufficientData {
            requested: n_periods,
            available: values.len(),
        });
    }

    let mut best = PivotPoint {
        value: values[0],
        periods_ago: 0,
    };
    for (index, &value) in values[..n_periods].iter().enumerate().skip(1) {
        if better(value, best.value) {
            best = PivotPoint {
                value,
                periods_ago: index,
            };
        }
    }

    Ok(best)
}

/// Arithmetic mean of the first `n_periods` entries of the volume series.
pub fn average_volume(volumes: &[f64], n_periods: usize) -> Result<f64> {
    if n_periods == 0 {
        return Err(ClientError::message(
            "Volume lookback must be at least one period",
        ));
    }
    if volumes.len() < n_periods {
        return Err(ClientError::InsufficientData {
            requested: n_periods,
            available: volumes.len(),
        });
    }

    Ok(volumes[..n_periods].iter().sum::<f64>() / n_periods as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmaRow {
    pub ticker: String,
    pub date: String,
    pub reference_date: String,
    pub value: f64,
}

/// Indicator rows labelled with the window they were computed over.
#[derive(Debug, Clone)]
pub struct SmaTable {
    pub label: String,
    pub rows: Vec<SmaRow>,
}

/// Flatten a provider SMA series into analysis rows. The entry dated
/// `reference_date` covers the period still in progress and is dropped so
/// historical comparisons carry no look-ahead.
pub fn build_sma_table(
    series: &IndexMap<String, SmaEntry>,
    period: u32,
    ticker: &str,
    reference_date: &str,
) -> Result<SmaTable> {
    let mut rows = Vec::with_capacity(series.len());

    for (date, entry) in series {
        if date == reference_date {
            continue;
        }

        let value = entry.sma.trim().parse::<f64>().map_err(|_| {
            ClientError::message(format!(
                "Failed to parse SMA value '{}' for {}",
                entry.sma, date
            ))
        })?;

        rows.push(SmaRow {
            ticker: ticker.to_string(),
            date: date.clone(),
            reference_date: reference_date.to_string(),
            value,
        });
    }

    Ok(SmaTable {
        label: format!("SMA_{}", period),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivots_find_extrema_over_the_first_n_periods() {
        let lows = [5.0, 3.0, 4.0, 1.0, 2.0];
        let highs = [8.0, 9.5, 7.0, 12.0, 6.0];

        let (support, resistance) = pivots(&lows, &highs, 3).unwrap();

        assert_eq!(
            support,
            PivotPoint {
                value: 3.0,
                periods_ago: 1
            }
        );
        assert_eq!(
            resistance,
            PivotPoint {
                value: 9.5,
                periods_ago: 1
            }
        );
    }

    #[test]
    fn pivots_report_the_earliest_offset_on_ties() {
        let lows = [2.0, 1.0, 1.0];
        let highs = [4.0, 4.0, 3.0];

        let (support, resistance) = pivots(&lows, &highs, 3).unwrap();

        assert_eq!(support.periods_ago, 1);
        assert_eq!(resistance.periods_ago, 0);
    }

    #[test]
    fn pivots_require_enough_periods() {
        let series = [1.0, 2.0];

        match pivots(&series, &series, 3) {
            Err(ClientError::InsufficientData {
                requested,
                available,
            }) => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("Expected InsufficientData error, got {:?}", other),
        }
    }

    #[test]
    fn average_volume_means_the_first_n_entries() {
        let volumes = [100.0, 200.0, 300.0, 4000.0];

        let mean = average_volume(&volumes, 3).unwrap();

        assert!((mean - 200.0).abs() < 1e-9);
    }

    #[test]
    fn average_volume_requires_enough_periods() {
        assert!(matches!(
            average_volume(&[100.0], 2),
            Err(ClientError::InsufficientData { .. })
        ));
    }

    #[test]
    fn sma_table_drops_the_reference_date_row() {
        let mut series = IndexMap::new();
        series.insert(
            "2020-01-02".to_string(),
            SmaEntry {
                sma: "2.0".to_string(),
            },
        );
        series.insert(
            "2020-01-01".to_string(),
            SmaEntry {
                sma: "1.0".to_string(),
            },
        );

        let table = build_sma_table(&series, 20, "AAPL", "2020-01-02").unwrap();

        assert_eq!(table.label, "SMA_20");
        assert_eq!(
            table.rows,
            vec![SmaRow {
                ticker: "AAPL".to_string(),
                date: "2020-01-01".to_string(),
                reference_date: "2020-01-02".to_string(),
                value: 1.0,
            }]
        );
    }

    #[test]
    fn sma_table_rejects_malformed_values() {
        let mut series = IndexMap::new();
        series.insert(
            "2020-01-01".to_string(),
            SmaEntry {
                sma: "not-a-number".to_string(),
            },
        );

        assert!(build_sma_table(&series, 20, "AAPL", "2020-01-02").is_err());
    }
}
