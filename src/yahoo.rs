use crate::series::{PriceBar, PriceSeries};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use chrono_tz::Tz;
use rand::seq::IndexedRandom;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Error)]
pub enum YahooError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cannot decode provider response: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid period '{0}'")]
    InvalidPeriod(String),
    #[error("invalid interval '{0}'")]
    InvalidInterval(String),
    #[error("provider returned HTTP {0}")]
    Status(StatusCode),
    #[error("provider error {code}: {description}")]
    Provider { code: String, description: String },
    #[error("invalid base url '{0}'")]
    InvalidUrl(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("provider returned no rows")]
    NoData,
}

/// Lookback window accepted by the chart endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    #[default]
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    YearToDate,
    Max,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::YearToDate => "ytd",
            Period::Max => "max",
        }
    }
}

impl FromStr for Period {
    type Err = YahooError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(Period::OneDay),
            "5d" => Ok(Period::FiveDays),
            "1mo" => Ok(Period::OneMonth),
            "3mo" => Ok(Period::ThreeMonths),
            "6mo" => Ok(Period::SixMonths),
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            "10y" => Ok(Period::TenYears),
            "ytd" => Ok(Period::YearToDate),
            "max" => Ok(Period::Max),
            _ => Err(YahooError::InvalidPeriod(s.to_string())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bar size. Only daily bars feed the moving averages, the others are kept
/// for ad-hoc runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

impl FromStr for Interval {
    type Err = YahooError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1d" | "1D" => Ok(Interval::Daily),
            "1wk" | "1W" => Ok(Interval::Weekly),
            "1mo" | "1M" => Ok(Interval::Monthly),
            _ => Err(YahooError::InvalidInterval(s.to_string())),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Wire format of /v8/finance/chart ---

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct ChartEnvelope {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    pub timestamp: Option<Vec<i64>>,
    pub indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub currency: Option<String>,
    pub symbol: Option<String>,
    pub exchange_timezone_name: Option<String>,
    pub gmtoffset: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteColumns>,
    #[serde(default)]
    pub adjclose: Vec<AdjCloseColumn>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteColumns {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct AdjCloseColumn {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

/// Calendar used to date bars: the exchange zone when the provider names a
/// known one, otherwise its fixed GMT offset.
#[derive(Debug, Clone, Copy)]
enum ExchangeZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl ExchangeZone {
    fn from_meta(meta: &ChartMeta) -> Self {
        if let Some(tz) = meta
            .exchange_timezone_name
            .as_deref()
            .and_then(|name| name.parse::<Tz>().ok())
        {
            return ExchangeZone::Named(tz);
        }
        let offset = meta
            .gmtoffset
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        ExchangeZone::Fixed(offset)
    }

    fn local_date(&self, timestamp: i64) -> Option<NaiveDate> {
        let utc = DateTime::<Utc>::from_timestamp(timestamp, 0)?;
        Some(match self {
            ExchangeZone::Named(tz) => utc.with_timezone(tz).date_naive(),
            ExchangeZone::Fixed(offset) => utc.with_timezone(offset).date_naive(),
        })
    }
}

/// Turn a decoded chart response into a date-ordered series.
///
/// Rows without a close are dropped. With `auto_adjust`, prices are rescaled so
/// the close equals the split and dividend adjusted close, and rows whose
/// adjusted close is missing are dropped too.
pub fn parse_chart_response(
    symbol: &str,
    response: ChartResponse,
    auto_adjust: bool,
) -> Result<PriceSeries, YahooError> {
    if let Some(error) = response.chart.error {
        return Err(YahooError::Provider {
            code: error.code,
            description: error.description.unwrap_or_default(),
        });
    }

    let result = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or(YahooError::NoData)?;

    let timestamps = result.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        return Err(YahooError::NoData);
    }

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let length = timestamps.len();
    if [quote.open.len(), quote.high.len(), quote.low.len(), quote.close.len()]
        .iter()
        .any(|&len| len != length)
    {
        return Err(YahooError::InvalidResponse("Inconsistent array lengths".to_string()));
    }

    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|column| column.adjclose)
        .filter(|column| column.len() == length);
    if auto_adjust && adjclose.is_none() {
        debug!(symbol, "No adjusted closes in response, keeping raw prices");
    }

    let zone = ExchangeZone::from_meta(&result.meta);
    let mut bars: Vec<PriceBar> = Vec::with_capacity(length);
    let mut dropped = 0usize;

    for (i, &timestamp) in timestamps.iter().enumerate() {
        let Some(close) = quote.close[i] else {
            dropped += 1;
            continue;
        };
        let date = zone.local_date(timestamp).ok_or_else(|| {
            YahooError::InvalidResponse(format!("Cannot convert timestamp {} at index {}", timestamp, i))
        })?;

        let open = quote.open[i].unwrap_or(close);
        let high = quote.high[i].unwrap_or(close);
        let low = quote.low[i].unwrap_or(close);
        let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0).max(0.0) as u64;

        let ratio = match (&adjclose, auto_adjust) {
            (Some(adj), true) => match adj[i].filter(|_| close != 0.0) {
                Some(adjusted) => Some(adjusted / close),
                // A raw close among adjusted ones would distort the averages.
                None => {
                    dropped += 1;
                    continue;
                }
            },
            _ => None,
        };

        let bar = match ratio {
            Some(ratio) => PriceBar {
                date,
                open: open * ratio,
                high: high * ratio,
                low: low * ratio,
                close: close * ratio,
                volume,
            },
            None => PriceBar { date, open, high, low, close, volume },
        };
        bars.push(bar);
    }

    if dropped > 0 {
        debug!(symbol, dropped, "Dropped rows without a usable close price");
    }

    bars.sort_by(|a, b| a.date.cmp(&b.date));
    let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match deduped.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => deduped.push(bar),
        }
    }

    if deduped.is_empty() {
        return Err(YahooError::NoData);
    }

    Ok(PriceSeries {
        symbol: result.meta.symbol.unwrap_or_else(|| symbol.to_string()),
        currency: result.meta.currency,
        timezone: result.meta.exchange_timezone_name,
        bars: deduped,
    })
}

pub struct YahooClient {
    client: Client,
    base_url: String,
    user_agents: Vec<String>,
    random_agent: bool,
    auto_adjust: bool,
}

impl YahooClient {
    pub fn new(random_agent: bool) -> Result<Self, YahooError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
        ];

        Ok(YahooClient {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agents,
            random_agent,
            auto_adjust: true,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_auto_adjust(mut self, auto_adjust: bool) -> Self {
        self.auto_adjust = auto_adjust;
        self
    }

    fn get_user_agent(&self) -> &str {
        let agent = if self.random_agent {
            self.user_agents.choose(&mut rand::rng())
        } else {
            self.user_agents.first()
        };
        agent.map(String::as_str).unwrap_or_default()
    }

    /// Chart endpoint for `symbol`, with the symbol percent-encoded as one path segment.
    fn chart_url(&self, symbol: &str) -> Result<Url, YahooError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|_| YahooError::InvalidUrl(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| YahooError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }

    /// Daily history for `symbol` over the trailing `period`. One request, no retries.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn get_history(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries, YahooError> {
        let url = self.chart_url(symbol)?;
        debug!(%url, "Requesting chart data");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("User-Agent", self.get_user_agent())
            .query(&[
                ("range", period.as_str()),
                ("interval", interval.as_str()),
                ("includeAdjustedClose", "true"),
                ("events", "div,splits"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let decoded = serde_json::from_str::<ChartResponse>(&body);
        if !status.is_success() {
            // The endpoint reports unknown symbols as 404 with an error object.
            return match decoded {
                Ok(chart) => match chart.chart.error {
                    Some(error) => Err(YahooError::Provider {
                        code: error.code,
                        description: error.description.unwrap_or_default(),
                    }),
                    None => Err(YahooError::Status(status)),
                },
                Err(_) => {
                    warn!(%status, "Provider returned an undecodable error body");
                    Err(YahooError::Status(status))
                }
            };
        }

        let series = parse_chart_response(symbol, decoded?, self.auto_adjust)?;
        info!(
            symbol,
            rows = series.len(),
            currency = ?series.currency,
            timezone = ?series.timezone,
            "Fetched price history"
        );
        Ok(series)
    }
}
