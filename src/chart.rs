use crate::error::PipelineError;
use crate::series::AnalyzedSeries;
use crate::utils::format_with_separator;
use chrono::{Duration, NaiveDate};
use plotters::element::DashedPathElement;
use plotters::prelude::*;
use std::io;
use std::ops::Range;
use std::path::Path;
use tracing::info;

pub const CHART_WIDTH: u32 = 2800;
pub const CHART_HEIGHT: u32 = 1400;

const CLOSE_COLOR: RGBColor = RGBColor(0x1f, 0x77, 0xb4);
const MA_20_COLOR: RGBColor = RGBColor(0xff, 0x7f, 0x0e);
const MA_50_COLOR: RGBColor = RGBColor(0x2c, 0xa0, 0x2c);

const FONT: &str = "sans-serif";

/// Date span of the x-axis. A single day is widened so the axis is not empty.
pub fn date_range(series: &AnalyzedSeries) -> Option<Range<NaiveDate>> {
    let first = series.rows.first()?.bar.date;
    let last = series.rows.last()?.bar.date;
    if first == last {
        Some(first..last + Duration::days(1))
    } else {
        Some(first..last)
    }
}

/// Price span covering close and both averages, padded by 5% on each side.
pub fn price_range(series: &AnalyzedSeries) -> Option<Range<f64>> {
    let values = series
        .rows
        .iter()
        .flat_map(|row| [Some(row.bar.close), row.ma_20, row.ma_50])
        .flatten()
        .filter(|v| v.is_finite());

    let (min, max) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        Some((min, max)) => Some((min.min(v), max.max(v))),
        None => Some((v, v)),
    })?;

    let pad = if max > min {
        (max - min) * 0.05
    } else {
        (max.abs() * 0.05).max(1.0)
    };
    Some(min - pad..max + pad)
}

/// Draw close, MA 20 and MA 50 to a PNG at `path`, replacing any existing file.
pub fn render_chart(series: &AnalyzedSeries, ticker: &str, path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(PipelineError::filesystem(
                path,
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("directory {} does not exist", parent.display()),
                ),
            ));
        }
    }

    let (Some(x_range), Some(y_range)) = (date_range(series), price_range(series)) else {
        return Err(PipelineError::Rendering("nothing to plot for an empty series".to_string()));
    };

    draw(series, ticker, path, x_range, y_range)
        .map_err(|e| PipelineError::Rendering(e.to_string()))?;

    info!(path = %path.display(), width = CHART_WIDTH, height = CHART_HEIGHT, "Rendered chart");
    Ok(())
}

// The bitmap surface lives only inside this function and is released on every return path.
fn draw(
    series: &AnalyzedSeries,
    ticker: &str,
    path: &Path,
    x_range: Range<NaiveDate>,
    y_range: Range<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let y_desc = match &series.currency {
        Some(currency) => format!("Price ({})", currency),
        None => "Price".to_string(),
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} - Stock Price with Moving Averages (1 Year)", ticker),
            (FONT, 56).into_font().style(FontStyle::Bold),
        )
        .margin(40)
        .x_label_area_size(110)
        .y_label_area_size(190)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .light_line_style(BLACK.mix(0.04))
        .bold_line_style(BLACK.mix(0.12))
        .x_labels(12)
        .x_label_formatter(&|date: &NaiveDate| date.format("%Y-%m").to_string())
        .y_label_formatter(&|price: &f64| format_with_separator(*price, 0))
        .label_style((FONT, 28))
        .x_desc("Date")
        .y_desc(y_desc)
        .axis_desc_style((FONT, 36))
        .draw()?;

    let closes: Vec<(NaiveDate, f64)> = series
        .rows
        .iter()
        .map(|row| (row.bar.date, row.bar.close))
        .collect();
    let ma_20: Vec<(NaiveDate, f64)> = series
        .rows
        .iter()
        .filter_map(|row| row.ma_20.map(|v| (row.bar.date, v)))
        .collect();
    let ma_50: Vec<(NaiveDate, f64)> = series
        .rows
        .iter()
        .filter_map(|row| row.ma_50.map(|v| (row.bar.date, v)))
        .collect();

    chart
        .draw_series(LineSeries::new(closes, CLOSE_COLOR.stroke_width(4)))?
        .label("Close Price")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 60, y)], CLOSE_COLOR.stroke_width(4)));

    chart
        .draw_series(DashedLineSeries::new(ma_20, 18, 10, MA_20_COLOR.stroke_width(3)))?
        .label("20-Day MA")
        .legend(|(x, y)| {
            DashedPathElement::new(vec![(x, y), (x + 60, y)], 12, 8, MA_20_COLOR.stroke_width(3))
        });

    chart
        .draw_series(DashedLineSeries::new(ma_50, 18, 10, MA_50_COLOR.stroke_width(3)))?
        .label("50-Day MA")
        .legend(|(x, y)| {
            DashedPathElement::new(vec![(x, y), (x + 60, y)], 12, 8, MA_50_COLOR.stroke_width(3))
        });

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK.mix(0.3))
        .label_font((FONT, 30))
        .margin(20)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::add_moving_averages;
    use crate::series::{PriceBar, PriceSeries};

    fn analyzed(closes: &[f64]) -> AnalyzedSeries {
        let start = NaiveDate::from_ymd_opt(2024, 10, 21).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0,
            })
            .collect();
        let mut series = PriceSeries::new("005930.KS", bars);
        series.currency = Some("KRW".to_string());
        add_moving_averages(&series)
    }

    #[test]
    fn test_price_range_pads_extremes() {
        let range = price_range(&analyzed(&[100.0, 200.0, 150.0])).unwrap();
        assert_eq!(range, 95.0..205.0);
    }

    #[test]
    fn test_price_range_flat_series() {
        let range = price_range(&analyzed(&[100.0, 100.0])).unwrap();
        assert_eq!(range, 95.0..105.0);
        assert!(price_range(&analyzed(&[])).is_none());
    }

    #[test]
    fn test_date_range_single_day_is_widened() {
        let range = date_range(&analyzed(&[42.0])).unwrap();
        assert_eq!(range.end - range.start, Duration::days(1));

        let range = date_range(&analyzed(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(range.start.to_string(), "2024-10-21");
        assert_eq!(range.end.to_string(), "2024-10-23");
    }

    #[test]
    fn test_missing_directory_is_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("chart.png");
        let result = render_chart(&analyzed(&[1.0, 2.0]), "005930.KS", &path);
        assert!(matches!(result, Err(PipelineError::Filesystem { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_series_is_rendering_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        let result = render_chart(&analyzed(&[]), "005930.KS", &path);
        assert!(matches!(result, Err(PipelineError::Rendering(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        let closes: Vec<f64> = (0..120).map(|i| 60_000.0 + (i as f64 * 0.2).sin() * 4_000.0).collect();

        render_chart(&analyzed(&closes), "005930.KS", &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_render_overwrites_existing_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        std::fs::write(&path, b"stale").unwrap();

        render_chart(&analyzed(&[100.0, 101.5, 99.0]), "005930.KS", &path).unwrap();
        let first = std::fs::read(&path).unwrap();
        assert_eq!(&first[1..4], b"PNG");

        let closes: Vec<f64> = (0..60).map(|i| 70_000.0 + i as f64 * 25.0).collect();
        render_chart(&analyzed(&closes), "005930.KS", &path).unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(&second[1..4], b"PNG");
        assert_ne!(first, second);
    }
}
