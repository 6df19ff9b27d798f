use crate::yahoo::YahooError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure of a pipeline stage. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no price data available for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[source] csv::Error),

    #[error("chart rendering failed: {0}")]
    Rendering(String),
}

impl PipelineError {
    pub fn data_unavailable(ticker: &str, error: YahooError) -> Self {
        PipelineError::DataUnavailable {
            ticker: ticker.to_string(),
            reason: error.to_string(),
        }
    }

    pub fn filesystem(path: &Path, source: io::Error) -> Self {
        PipelineError::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Splits csv errors into filesystem failures and everything else.
    pub fn from_csv(path: &Path, error: csv::Error) -> Self {
        if !error.is_io_error() {
            return PipelineError::Csv(error);
        }
        match error.into_kind() {
            csv::ErrorKind::Io(source) => PipelineError::filesystem(path, source),
            other => PipelineError::filesystem(path, io::Error::other(format!("{other:?}"))),
        }
    }
}
