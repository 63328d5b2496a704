//! Kraken public-API market data source.
//!
//! Fetches OHLCV bars from the public OHLC endpoint and last prices from
//! the Ticker endpoint, with retries, exponential backoff, and the
//! circuit breaker. The signed private API is out of scope here; order
//! routing goes through an `ExchangeSink` instead.

use super::circuit_breaker::CircuitBreaker;
use super::{DataError, MarketDataSource};
use crate::domain::{Bar, Timeframe};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const API_BASE: &str = "https://api.kraken.com/0/public";

/// Normalize a `BASE/QUOTE` symbol to Kraken's wire format.
///
/// `BTC/USD` -> `XXBTZUSD`, `ETH/EUR` -> `XETHZEUR`. Symbols without a
/// slash pass through unchanged.
pub fn kraken_pair(symbol: &str) -> String {
    let Some((base, quote)) = symbol.split_once('/') else {
        return symbol.to_string();
    };
    let base = match base {
        "BTC" | "XBT" => "XXBT",
        "ETH" => "XETH",
        other => other,
    };
    let quote = match quote {
        "USD" => "ZUSD",
        "EUR" => "ZEUR",
        other => other,
    };
    format!("{base}{quote}")
}

/// Kraken public REST source.
pub struct KrakenSource {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl KrakenSource {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("tradelab/0.1")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    fn ohlc_url(pair: &str, interval: u32, since: Option<i64>) -> String {
        let mut url = format!("{API_BASE}/OHLC?pair={pair}&interval={interval}");
        if let Some(since_ms) = since {
            // Kraken's cursor is in seconds.
            url.push_str(&format!("&since={}", since_ms / 1000));
        }
        url
    }

    fn ticker_url(pair: &str) -> String {
        format!("{API_BASE}/Ticker?pair={pair}")
    }

    /// GET a public endpoint and return its `result` object. Retries on
    /// transient failures and keeps the circuit breaker informed.
    fn get_result(&self, symbol: &str, url: &str) -> Result<Value, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // Address ban — stop hammering the endpoint
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let body: Value = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    let result = Self::unwrap_envelope(symbol, body)?;
                    self.circuit_breaker.record_success();
                    return Ok(result);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    /// Unwrap Kraken's `{"error": [...], "result": {...}}` envelope.
    fn unwrap_envelope(symbol: &str, body: Value) -> Result<Value, DataError> {
        let errors: Vec<String> = body
            .get("error")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(first) = errors.first() {
            if first.contains("Unknown asset pair") {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if first.contains("Too many requests") {
                return Err(DataError::RateLimited {
                    retry_after_secs: 60,
                });
            }
            return Err(DataError::Other(errors.join("; ")));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| DataError::ResponseFormatChanged("missing result object".into()))
    }

    /// Pull the OHLC row array out of the result object. The object maps
    /// the wire pair name to rows, plus a `last` pagination cursor.
    fn parse_ohlc_rows(symbol: &str, result: &Value) -> Result<Vec<Bar>, DataError> {
        let obj = result
            .as_object()
            .ok_or_else(|| DataError::ResponseFormatChanged("result is not an object".into()))?;

        let rows = obj
            .iter()
            .find(|(key, _)| key.as_str() != "last")
            .and_then(|(_, value)| value.as_array())
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("no OHLC rows for {symbol}"))
            })?;

        let mut bars = Vec::with_capacity(rows.len());
        for row in rows {
            bars.push(Self::parse_ohlc_row(row)?);
        }
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    /// One row: `[time_secs, open, high, low, close, vwap, volume, count]`.
    fn parse_ohlc_row(row: &Value) -> Result<Bar, DataError> {
        let fields = row
            .as_array()
            .ok_or_else(|| DataError::ResponseFormatChanged("OHLC row is not an array".into()))?;
        if fields.len() < 7 {
            return Err(DataError::ResponseFormatChanged(format!(
                "OHLC row has {} fields, expected 8",
                fields.len()
            )));
        }

        let ts_secs = fields[0].as_i64().ok_or_else(|| {
            DataError::ResponseFormatChanged("non-numeric OHLC timestamp".into())
        })?;

        Ok(Bar {
            timestamp: ts_secs * 1000,
            open: numeric_field(&fields[1], "open")?,
            high: numeric_field(&fields[2], "high")?,
            low: numeric_field(&fields[3], "low")?,
            close: numeric_field(&fields[4], "close")?,
            volume: numeric_field(&fields[6], "volume")?,
        })
    }

    /// Last traded price from a Ticker result: `c[0]` of the pair entry.
    fn parse_ticker_last(symbol: &str, result: &Value) -> Result<f64, DataError> {
        let obj = result
            .as_object()
            .ok_or_else(|| DataError::ResponseFormatChanged("result is not an object".into()))?;

        let ticker = obj
            .iter()
            .find(|(key, _)| key.as_str() != "last")
            .map(|(_, value)| value)
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("no ticker entry for {symbol}"))
            })?;

        let last = ticker
            .get("c")
            .and_then(|c| c.get(0))
            .ok_or_else(|| DataError::ResponseFormatChanged("ticker is missing c[0]".into()))?;

        numeric_field(last, "last price")
    }
}

/// Kraken quotes prices as JSON strings.
fn numeric_field(value: &Value, name: &str) -> Result<f64, DataError> {
    match value {
        Value::String(s) => s.parse::<f64>().map_err(|_| {
            DataError::ResponseFormatChanged(format!("non-numeric {name}: {s:?}"))
        }),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("non-numeric {name}"))),
        other => Err(DataError::ResponseFormatChanged(format!(
            "unexpected {name}: {other}"
        ))),
    }
}

impl MarketDataSource for KrakenSource {
    fn name(&self) -> &str {
        "kraken"
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>, DataError> {
        let pair = kraken_pair(symbol);
        let url = Self::ohlc_url(&pair, timeframe.minutes(), since);
        let result = self.get_result(symbol, &url)?;
        let mut bars = Self::parse_ohlc_rows(symbol, &result)?;
        if let Some(limit) = limit {
            bars.truncate(limit);
        }
        Ok(bars)
    }

    fn latest_price(&self, symbol: &str) -> Result<f64, DataError> {
        let pair = kraken_pair(symbol);
        let result = self.get_result(symbol, &Self::ticker_url(&pair))?;
        Self::parse_ticker_last(symbol, &result)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
