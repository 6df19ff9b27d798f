use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// --- Raw provider data ---

/// One trading day of OHLC data, dated in the exchange's local calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Daily bars for one instrument, strictly increasing by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub currency: Option<String>,
    pub timezone: Option<String>,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: &str, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: symbol.to_string(),
            currency: None,
            timezone: None,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }
}

// --- Transformed data ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedRow {
    pub bar: PriceBar,
    pub ma_20: Option<f64>,
    pub ma_50: Option<f64>,
}

/// Price series with the trailing moving averages attached to every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedSeries {
    pub symbol: String,
    pub currency: Option<String>,
    pub rows: Vec<AnalyzedRow>,
}

impl AnalyzedSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self) -> Option<SeriesSummary> {
        let first = self.rows.first()?;
        let last = self.rows.last()?;

        let (high, low) = self.rows.iter().fold(
            (f64::NEG_INFINITY, f64::INFINITY),
            |(high, low), row| (high.max(row.bar.close), low.min(row.bar.close)),
        );

        Some(SeriesSummary {
            first_date: first.bar.date,
            last_date: last.bar.date,
            latest_close: last.bar.close,
            latest_ma_20: last.ma_20,
            latest_ma_50: last.ma_50,
            high,
            low,
        })
    }
}

/// Headline figures printed after the averages are computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub latest_close: f64,
    pub latest_ma_20: Option<f64>,
    pub latest_ma_50: Option<f64>,
    /// Highest close over the series.
    pub high: f64,
    /// Lowest close over the series.
    pub low: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, close: f64, ma_20: Option<f64>) -> AnalyzedRow {
        AnalyzedRow {
            bar: PriceBar {
                date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000,
            },
            ma_20,
            ma_50: None,
        }
    }

    #[test]
    fn test_summary_of_empty_series() {
        let series = AnalyzedSeries {
            symbol: "005930.KS".to_string(),
            currency: None,
            rows: Vec::new(),
        };
        assert!(series.summary().is_none());
    }

    #[test]
    fn test_summary_uses_closing_prices() {
        let series = AnalyzedSeries {
            symbol: "005930.KS".to_string(),
            currency: Some("KRW".to_string()),
            rows: vec![
                row(4, 71_200.0, None),
                row(5, 73_400.0, None),
                row(6, 70_100.0, Some(71_566.5)),
            ],
        };

        let summary = series.summary().unwrap();
        assert_eq!(summary.first_date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(summary.last_date, NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
        assert_eq!(summary.latest_close, 70_100.0);
        assert_eq!(summary.latest_ma_20, Some(71_566.5));
        assert_eq!(summary.latest_ma_50, None);
        assert_eq!(summary.high, 73_400.0);
        assert_eq!(summary.low, 70_100.0);
    }

    #[test]
    fn test_closes_preserve_order() {
        let series = PriceSeries::new(
            "AAPL",
            vec![row(1, 10.0, None).bar, row(2, 12.5, None).bar],
        );
        assert_eq!(series.closes(), vec![10.0, 12.5]);
        assert_eq!(series.len(), 2);
        assert!(!series.is_empty());
    }
}
