use crate::yahoo::{Interval, Period, DEFAULT_BASE_URL};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_TICKER: &str = "005930.KS"; // Samsung Electronics
pub const DEFAULT_CSV_PATH: &str = "samsung_stock_data.csv";
pub const DEFAULT_CHART_PATH: &str = "samsung_stock_chart.png";

// YAML-serializable configuration structure. Every key is optional.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ConfigYaml {
    pub ticker: Option<String>,
    pub period: Option<String>,
    pub interval: Option<String>,
    pub csv_path: Option<PathBuf>,
    pub chart_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub auto_adjust: Option<bool>,
    pub random_agent: Option<bool>,
}

// Settings for one pipeline run
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    pub ticker: String,
    pub period: Period,
    pub interval: Interval,
    pub csv_path: PathBuf,
    pub chart_path: PathBuf,
    pub base_url: String,
    pub auto_adjust: bool,
    pub random_agent: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ticker: DEFAULT_TICKER.to_string(),
            period: Period::OneYear,
            interval: Interval::Daily,
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            chart_path: PathBuf::from(DEFAULT_CHART_PATH),
            base_url: DEFAULT_BASE_URL.to_string(),
            auto_adjust: true,
            random_agent: true,
        }
    }
}

impl AnalysisConfig {
    // Load configuration from a YAML file named by CONFIG_FILE, else from the environment
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    pub fn from_yaml(file_path: &str) -> anyhow::Result<Self> {
        let yaml_content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file {}", file_path))?;

        let yaml_config: ConfigYaml =
            serde_yaml::from_str(&yaml_content).context("Failed to parse YAML config")?;

        Self::from_parts(yaml_config)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from a key lookup using the same variable names as the environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_parts(ConfigYaml {
            ticker: lookup("TICKER"),
            period: lookup("PERIOD"),
            interval: lookup("INTERVAL"),
            csv_path: lookup("CSV_OUTPUT").map(PathBuf::from),
            chart_path: lookup("CHART_OUTPUT").map(PathBuf::from),
            base_url: lookup("YAHOO_BASE_URL"),
            auto_adjust: lookup("AUTO_ADJUST").and_then(|s| s.parse().ok()),
            random_agent: lookup("RANDOM_AGENT").and_then(|s| s.parse().ok()),
        })
    }

    fn from_parts(parts: ConfigYaml) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let period = match parts.period {
            Some(period) => period.parse::<Period>().context("Invalid PERIOD")?,
            None => defaults.period,
        };
        let interval = match parts.interval {
            Some(interval) => interval.parse::<Interval>().context("Invalid INTERVAL")?,
            None => defaults.interval,
        };

        let ticker = parts
            .ticker
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or(defaults.ticker);

        Ok(Self {
            ticker,
            period,
            interval,
            csv_path: parts.csv_path.unwrap_or(defaults.csv_path),
            chart_path: parts.chart_path.unwrap_or(defaults.chart_path),
            base_url: parts.base_url.unwrap_or(defaults.base_url),
            auto_adjust: parts.auto_adjust.unwrap_or(defaults.auto_adjust),
            random_agent: parts.random_agent.unwrap_or(defaults.random_agent),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_samsung_run() {
        let config = AnalysisConfig::default();
        assert_eq!(config.ticker, "005930.KS");
        assert_eq!(config.period, Period::OneYear);
        assert_eq!(config.csv_path, PathBuf::from("samsung_stock_data.csv"));
        assert_eq!(config.chart_path, PathBuf::from("samsung_stock_chart.png"));
        assert!(config.auto_adjust);
    }

    #[test]
    fn test_empty_lookup_gives_defaults() {
        let config = AnalysisConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_lookup_overrides() {
        let vars = HashMap::from([
            ("TICKER", "AAPL"),
            ("PERIOD", "6mo"),
            ("CSV_OUTPUT", "out/aapl.csv"),
            ("AUTO_ADJUST", "false"),
        ]);
        let config = AnalysisConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.ticker, "AAPL");
        assert_eq!(config.period, Period::SixMonths);
        assert_eq!(config.csv_path, PathBuf::from("out/aapl.csv"));
        assert_eq!(config.chart_path, PathBuf::from(DEFAULT_CHART_PATH));
        assert!(!config.auto_adjust);
    }

    #[test]
    fn test_invalid_period_is_rejected() {
        let result = AnalysisConfig::from_lookup(|key| (key == "PERIOD").then(|| "forever".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "ticker: 000660.KS\nchart_path: charts/hynix.png\nbase_url: http://localhost:9000\n",
        )
        .unwrap();

        let config = AnalysisConfig::from_yaml(path.to_str().unwrap()).unwrap();
        assert_eq!(config.ticker, "000660.KS");
        assert_eq!(config.chart_path, PathBuf::from("charts/hynix.png"));
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.csv_path, PathBuf::from(DEFAULT_CSV_PATH));
    }

    #[test]
    fn test_from_yaml_missing_file() {
        assert!(AnalysisConfig::from_yaml("/definitely/not/here.yaml").is_err());
    }
}
