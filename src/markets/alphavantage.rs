use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::config::DEFAULT_MIN_COMMON_DATES;
use crate::markets::{ProviderError, ReturnSeriesProvider};
use crate::serialization::DATE_FORMAT;
use crate::types::{ReturnKind, ReturnSeries};

const BASE_URL: &str = "https://www.alphavantage.co/query";

const TIME_SERIES_KEY: &str = "Time Series (Daily)";
const CLOSE_KEY: &str = "4. close";

/// Markets whose tickers need an exchange suffix, and the suffix to add
const MARKET_SUFFIXES: [[&str; 2]; 1] = [["INDIA", ".NSE"]];

/// Size of the daily history requested from the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputSize {
    /// Latest 100 data points
    Compact,
    /// Full history
    Full,
}

impl OutputSize {
    fn as_str(&self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

/// Daily return provider backed by the Alpha Vantage `TIME_SERIES_DAILY` endpoint.
///
/// The compact history is requested first. When it yields fewer returns than
/// `min_data_points`, the full history is requested instead.
#[derive(Clone)]
pub struct AlphaVantageClient {
    api_key: String,
    base_url: String,

    client: reqwest::Client,

    return_kind: ReturnKind,
    min_data_points: usize,
}

impl AlphaVantageClient {
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("reqwest"));

        let client = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            client,
            return_kind: ReturnKind::default(),
            min_data_points: DEFAULT_MIN_COMMON_DATES,
        })
    }

    /// Builder method for the kind of returns derived from closing prices
    pub fn with_return_kind(mut self, return_kind: ReturnKind) -> Self {
        self.return_kind = return_kind;
        self
    }

    /// Builder method for the number of returns below which the full history is fetched
    pub fn with_min_data_points(mut self, min_data_points: usize) -> Self {
        self.min_data_points = min_data_points;
        self
    }

    /// Builder method for the endpoint, used to point the client at a mirror or proxy
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_closes(&self, symbol: &str, output_size: OutputSize) -> Result<BTreeMap<NaiveDate, f64>, ProviderError> {
        info!("API request: {} data for {}", output_size.as_str(), symbol);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", output_size.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        parse_daily_closes(&response, symbol)
    }
}

#[async_trait]
impl ReturnSeriesProvider for AlphaVantageClient {
    fn name(&self) -> &str {
        "Alpha Vantage"
    }

    async fn daily_returns(&self, ticker: &str, market: &str) -> Result<ReturnSeries, ProviderError> {
        if ticker.trim().is_empty() {
            return Err(ProviderError::Api("Ticker cannot be empty".to_string()));
        }
        let symbol = adjust_symbol(ticker, market);

        let closes = self.fetch_closes(&symbol, OutputSize::Compact).await.map_err(|e| {
            error!("Failed to fetch data for {}: {}", symbol, e);
            e
        })?;
        let returns = ReturnSeries::from_closes(&closes, self.return_kind);
        if returns.len() >= self.min_data_points {
            info!("Fetched {} daily returns for {}", returns.len(), symbol);
            return Ok(returns);
        }

        warn!(
            "Compact output insufficient for {} ({} points), trying full output",
            symbol,
            returns.len()
        );
        let closes = self.fetch_closes(&symbol, OutputSize::Full).await.map_err(|e| {
            error!("Failed to fetch data for {}: {}", symbol, e);
            e
        })?;
        let returns = ReturnSeries::from_closes(&closes, self.return_kind);

        if returns.is_empty() {
            return Err(ProviderError::NotFound(symbol));
        }
        if returns.len() < self.min_data_points {
            return Err(ProviderError::InsufficientData {
                ticker: symbol,
                found: returns.len(),
                required: self.min_data_points,
            });
        }

        info!("Fetched {} daily returns for {}", returns.len(), symbol);
        Ok(returns)
    }
}

/// Normalize a ticker and append the exchange suffix its market requires
fn adjust_symbol(ticker: &str, market: &str) -> String {
    let symbol = ticker.trim().to_uppercase();
    if symbol.contains('.') {
        return symbol;
    }

    match MARKET_SUFFIXES.iter().find(|[name, _]| name.eq_ignore_ascii_case(market)) {
        Some([_, suffix]) => format!("{}{}", symbol, suffix),
        None => symbol,
    }
}

/// Extract closing prices from a `TIME_SERIES_DAILY` response.
///
/// Alpha Vantage reports quota and usage problems with a `200 OK` and a `Note`,
/// `Information` or `Error Message` field instead of the time series.
fn parse_daily_closes(root: &Value, symbol: &str) -> Result<BTreeMap<NaiveDate, f64>, ProviderError> {
    if let Some(note) = root.get("Note").and_then(Value::as_str) {
        error!("Alpha Vantage rate limit hit: {}", note);
        return Err(ProviderError::RateLimited(note.to_string()));
    }
    if let Some(information) = root.get("Information").and_then(Value::as_str) {
        warn!("API information: {}", information);
        return Err(ProviderError::Api(information.to_string()));
    }
    if let Some(message) = root.get("Error Message").and_then(Value::as_str) {
        error!("API error for {}: {}", symbol, message);
        return Err(ProviderError::Api(format!("Invalid ticker {}: {}", symbol, message)));
    }

    let time_series = root
        .get(TIME_SERIES_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;

    let closes = time_series
        .iter()
        .filter_map(|(raw_date, bar)| {
            let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).ok()?;
            let close = match bar.get(CLOSE_KEY)? {
                Value::String(raw) => raw.parse::<f64>().ok()?,
                Value::Number(number) => number.as_f64()?,
                _ => return None,
            };
            Some((date, close))
        })
        .collect::<BTreeMap<_, _>>();

    if closes.is_empty() {
        return Err(ProviderError::NotFound(symbol.to_string()));
    }

    debug!("Found {} daily closes for {}", closes.len(), symbol);
    Ok(closes)
}
