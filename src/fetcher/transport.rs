/*
 *  fetcher/transport.rs
 *
 *  tickertape - LED stock ticker
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::fmt::{self, Display};
use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Error as JsonError, Value};

use crate::config::Settings;
use crate::constants::{ICON_REPO_URL, ICON_TIMEOUT, INDEX_QUOTE_URL, KEYED_QUOTE_URL, QUOTE_TIMEOUT};
use crate::quote::Quote;
use crate::symbol::Symbol;

const VERSION: &str = concat!("tickertape/", env!("CARGO_PKG_VERSION"));

/// Errors from a single quote or icon request.
#[derive(Debug)]
pub enum FetchError {
    HttpRequestError(reqwest::Error),
    /// HTTP 429, counted toward backoff
    RateLimited,
    Status(u16),
    Timeout,
    DeserializationError(JsonError),
    MissingData(String),
    ClientBuild(String),
    Io(std::io::Error),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::HttpRequestError(e) => write!(f, "HTTP request error: {}", e),
            FetchError::RateLimited => write!(f, "rate limited (HTTP 429)"),
            FetchError::Status(code) => write!(f, "unexpected HTTP status {}", code),
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::DeserializationError(e) => write!(f, "JSON deserialization error: {}", e),
            FetchError::MissingData(msg) => write!(f, "Missing quote data: {}", msg),
            FetchError::ClientBuild(msg) => write!(f, "HTTP client setup error: {}", msg),
            FetchError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
            FetchError::RateLimited
        } else if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::HttpRequestError(err)
        }
    }
}

impl From<JsonError> for FetchError {
    fn from(err: JsonError) -> Self {
        FetchError::DeserializationError(err)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(err)
    }
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

/// The wire side of the fetcher: one request per call.
///
/// Implementations must be shareable across the worker pool.
pub trait QuoteTransport: Send + Sync + 'static {
    /// No-key index feed.
    fn index_quote(&self, symbol: &Symbol) -> impl Future<Output = Result<Quote, FetchError>> + Send;

    /// Keyed per-symbol feed.
    fn keyed_quote(&self, symbol: &Symbol, key: &str) -> impl Future<Output = Result<Quote, FetchError>> + Send;
}

/// Raw icon bytes from the public repository.
pub trait IconSource: Send + Sync + 'static {
    fn icon_bytes(&self, symbol: &Symbol) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// reqwest backed transport, proxy and CA certificate taken from settings.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct KeyedBody {
    c: Option<f64>,
    pc: Option<f64>,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .timeout(QUOTE_TIMEOUT);

        if let Some(proxy) = settings.proxy_url() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| FetchError::ClientBuild(format!("proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        if let Some(path) = settings.cert_path() {
            let pem = std::fs::read(path)?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| FetchError::ClientBuild(format!("certificate {}: {}", path.display(), e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;
        Ok(HttpTransport { client })
    }

    fn check_status(status: StatusCode) -> Result<(), FetchError> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Err(FetchError::RateLimited)
        } else if !status.is_success() {
            Err(FetchError::Status(status.as_u16()))
        } else {
            Ok(())
        }
    }
}

/// `<base>/<symbol>` with the symbol as a single escaped path segment.
fn segment_url(base: &str, segment: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(base).map_err(|e| FetchError::ClientBuild(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| FetchError::ClientBuild(format!("{} cannot take a path", base)))?
        .push(segment);
    Ok(url)
}

/// Pull price and previous close out of a chart response.
pub fn parse_index_body(body: &Value) -> Result<Quote, FetchError> {
    let meta = body
        .pointer("/chart/result/0/meta")
        .ok_or_else(|| FetchError::MissingData("chart.result[0].meta".into()))?;
    let price = meta
        .get("regularMarketPrice")
        .and_then(Value::as_f64)
        .ok_or_else(|| FetchError::MissingData("regularMarketPrice".into()))?;
    let previous_close = meta
        .get("previousClose")
        .and_then(Value::as_f64)
        .or_else(|| meta.get("chartPreviousClose").and_then(Value::as_f64));
    Ok(Quote::new(Some(price), previous_close))
}

impl QuoteTransport for HttpTransport {
    async fn index_quote(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        let url = segment_url(INDEX_QUOTE_URL, symbol.as_str())?;
        let response = self.client.get(url).send().await?;
        Self::check_status(response.status())?;
        let body: Value = serde_json::from_str(&response.text().await?)?;
        parse_index_body(&body)
    }

    async fn keyed_quote(&self, symbol: &Symbol, key: &str) -> Result<Quote, FetchError> {
        let response = self
            .client
            .get(KEYED_QUOTE_URL)
            .query(&[("symbol", symbol.as_str()), ("token", key)])
            .send()
            .await?;
        Self::check_status(response.status())?;
        let body: KeyedBody = serde_json::from_str(&response.text().await?)?;
        Ok(Quote::new(body.c, body.pc))
    }
}

impl IconSource for HttpTransport {
    async fn icon_bytes(&self, symbol: &Symbol) -> Result<Vec<u8>, FetchError> {
        let url = segment_url(ICON_REPO_URL, &format!("{}.png", symbol.as_str()))?;
        let response = self.client.get(url).timeout(ICON_TIMEOUT).send().await?;
        Self::check_status(response.status())?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_index_body() {
        let body = json!({"chart": {"result": [{"meta": {"regularMarketPrice": 5000.5, "previousClose": 4950.0}}]}});
        assert_eq!(parse_index_body(&body).unwrap(), Quote::new(Some(5000.5), Some(4950.0)));

        let body = json!({"chart": {"result": [{"meta": {"regularMarketPrice": 10.0, "chartPreviousClose": 9.0}}]}});
        assert_eq!(parse_index_body(&body).unwrap().previous_close, Some(9.0));

        let body = json!({"chart": {"result": []}});
        assert!(matches!(parse_index_body(&body), Err(FetchError::MissingData(_))));
    }

    #[test]
    fn test_segment_url_keeps_base_path() {
        let url = segment_url(INDEX_QUOTE_URL, "^DJI").unwrap();
        assert!(url.as_str().starts_with("https://query1.finance.yahoo.com/v8/finance/chart/"));
        assert!(url.as_str().ends_with("DJI"));
    }

    #[test]
    fn test_keyed_body_zero_price() {
        let body: KeyedBody = serde_json::from_str(r#"{"c":0,"pc":0,"d":null}"#).unwrap();
        assert!(Quote::new(body.c, body.pc).is_absent());
    }
}
