use crate::series::{AnalyzedRow, AnalyzedSeries, PriceSeries};
use tracing::debug;

pub const MA_SHORT_WINDOW: usize = 20;
pub const MA_LONG_WINDOW: usize = 50;

/// Trailing simple moving average.
///
/// Entry `i` is the mean of `values[i + 1 - window..=i]`, or `None` while fewer
/// than `window` observations are available. A zero window yields no values.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let sum: f64 = values[i + 1 - window..=i].iter().sum();
            Some(sum / window as f64)
        })
        .collect()
}

/// Attach the 20 and 50 day moving averages of the close to every bar.
pub fn add_moving_averages(series: &PriceSeries) -> AnalyzedSeries {
    let closes = series.closes();
    let ma_20 = rolling_mean(&closes, MA_SHORT_WINDOW);
    let ma_50 = rolling_mean(&closes, MA_LONG_WINDOW);

    let rows: Vec<AnalyzedRow> = series
        .bars
        .iter()
        .zip(ma_20)
        .zip(ma_50)
        .map(|((bar, ma_20), ma_50)| AnalyzedRow {
            bar: bar.clone(),
            ma_20,
            ma_50,
        })
        .collect();

    debug!(
        symbol = %series.symbol,
        rows = rows.len(),
        ma_20_defined = rows.iter().filter(|r| r.ma_20.is_some()).count(),
        ma_50_defined = rows.iter().filter(|r| r.ma_50.is_some()).count(),
        "Computed moving averages"
    );

    AnalyzedSeries {
        symbol: series.symbol.clone(),
        currency: series.currency.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::PriceBar;
    use chrono::{Duration, NaiveDate};

    fn series_from_closes(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: start + Duration::days(i as i64),
                open: close - 1.0,
                high: close + 2.0,
                low: close - 2.0,
                close,
                volume: 10_000 + i as u64,
            })
            .collect();
        PriceSeries::new("005930.KS", bars)
    }

    fn wavy_closes(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 70_000.0 + (i as f64 * 0.7).sin() * 1_500.0 + i as f64 * 13.25)
            .collect()
    }

    #[test]
    fn test_rolling_mean_small_window() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(
            rolling_mean(&values, 3),
            vec![None, None, Some(2.0), Some(3.0), Some(4.0)]
        );
    }

    #[test]
    fn test_rolling_mean_window_larger_than_input() {
        assert_eq!(rolling_mean(&[100.0, 102.0, 101.0], 20), vec![None, None, None]);
    }

    #[test]
    fn test_rolling_mean_zero_window() {
        assert_eq!(rolling_mean(&[1.0, 2.0], 0), vec![None, None]);
    }

    #[test]
    fn test_moving_average_windows_match_exact_mean() {
        let closes = wavy_closes(120);
        let analyzed = add_moving_averages(&series_from_closes(&closes));
        assert_eq!(analyzed.len(), closes.len());

        for (i, row) in analyzed.rows.iter().enumerate() {
            if i < 19 {
                assert!(row.ma_20.is_none(), "ma_20 defined at {i}");
            } else {
                let expected = closes[i - 19..=i].iter().sum::<f64>() / 20.0;
                assert_eq!(row.ma_20, Some(expected));
            }

            if i < 49 {
                assert!(row.ma_50.is_none(), "ma_50 defined at {i}");
            } else {
                let expected = closes[i - 49..=i].iter().sum::<f64>() / 50.0;
                assert_eq!(row.ma_50, Some(expected));
            }
        }
    }

    #[test]
    fn test_rows_keep_their_bars() {
        let series = series_from_closes(&wavy_closes(30));
        let analyzed = add_moving_averages(&series);
        let bars: Vec<_> = analyzed.rows.iter().map(|r| r.bar.clone()).collect();
        assert_eq!(bars, series.bars);
        assert_eq!(analyzed.symbol, "005930.KS");
    }

    #[test]
    fn test_transform_is_deterministic() {
        let series = series_from_closes(&wavy_closes(75));
        let first = add_moving_averages(&series);
        let second = add_moving_averages(&series);

        let bits = |s: &AnalyzedSeries| -> Vec<(Option<u64>, Option<u64>)> {
            s.rows
                .iter()
                .map(|r| (r.ma_20.map(f64::to_bits), r.ma_50.map(f64::to_bits)))
                .collect()
        };
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn test_empty_series() {
        let analyzed = add_moving_averages(&series_from_closes(&[]));
        assert!(analyzed.is_empty());
    }

    #[test]
    fn test_short_series_has_no_averages() {
        let analyzed = add_moving_averages(&series_from_closes(&[100.0, 102.0, 101.0]));
        assert_eq!(analyzed.len(), 3);
        assert!(analyzed.rows.iter().all(|r| r.ma_20.is_none() && r.ma_50.is_none()));
    }
}
