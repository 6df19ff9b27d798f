use crate::error::PipelineError;
use crate::series::{AnalyzedRow, AnalyzedSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub const CSV_HEADER: [&str; 4] = ["Date", "Close", "MA_20", "MA_50"];

/// One line of the exported file. Undefined averages become empty fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "MA_20")]
    pub ma_20: Option<f64>,
    #[serde(rename = "MA_50")]
    pub ma_50: Option<f64>,
}

impl From<&AnalyzedRow> for CsvRecord {
    fn from(row: &AnalyzedRow) -> Self {
        Self {
            date: row.bar.date,
            close: row.bar.close,
            ma_20: row.ma_20,
            ma_50: row.ma_50,
        }
    }
}

/// Write close and moving averages to `path`, replacing any existing file.
/// Returns the number of data rows written.
pub fn write_csv(series: &AnalyzedSeries, path: &Path) -> Result<usize, PipelineError> {
    // Header is written by hand so an empty series still yields a valid file.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| PipelineError::from_csv(path, e))?;

    writer
        .write_record(CSV_HEADER)
        .map_err(|e| PipelineError::from_csv(path, e))?;

    for row in &series.rows {
        writer
            .serialize(CsvRecord::from(row))
            .map_err(|e| PipelineError::from_csv(path, e))?;
    }

    writer.flush().map_err(|e| PipelineError::filesystem(path, e))?;

    info!(path = %path.display(), rows = series.len(), "Wrote moving average CSV");
    Ok(series.len())
}

/// Read an exported file back, for round-trip checks.
#[cfg(test)]
pub fn read_csv(path: &Path) -> Result<Vec<CsvRecord>, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| PipelineError::from_csv(path, e))?;

    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: CsvRecord = result.map_err(|e| PipelineError::from_csv(path, e))?;
        records.push(record);
    }
    Ok(records)
}
