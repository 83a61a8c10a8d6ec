use std::time::Duration;

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header, Client, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(StatusCode),
}

pub type Result<T> = std::result::Result<T, HttpError>;

/// What a HEAD metadata probe learned about a resource.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub size: Option<u64>,
    pub accept_ranges: bool,
}

/// An open streaming fetch.
pub struct FetchResponse {
    /// True when the server answered a ranged request with 206 Partial
    /// Content. A 200 answer to a ranged request means the range was
    /// ignored and the body restarts from byte zero.
    pub resumed: bool,
    pub content_length: Option<u64>,
    pub stream: BoxStream<'static, Result<bytes::Bytes>>,
}

/// Thin wrapper over [`reqwest::Client`] for probe-then-stream fetches.
///
/// The timeout bounds the connect and each individual read, never the
/// transfer as a whole: a dead connection aborts, a slow healthy stream
/// runs for as long as it takes.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let inner = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { inner })
    }

    /// HEAD probe for total size and range support.
    ///
    /// Callers treat a probe failure as non-fatal: some servers reject
    /// HEAD but still honor ranged GETs.
    pub async fn probe(&self, url: &str) -> Result<Probe> {
        let response = self.inner.head(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status));
        }

        let size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&n| n > 0);
        let accept_ranges = response
            .headers()
            .get(header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false);

        Ok(Probe {
            size,
            accept_ranges,
        })
    }

    /// Issue the streaming GET. `offset > 0` asks for `bytes=<offset>-`;
    /// the caller must check [`FetchResponse::resumed`] to learn whether
    /// the server honored it.
    pub async fn fetch(&self, url: &str, offset: u64) -> Result<FetchResponse> {
        let mut request = self.inner.get(url);
        if offset > 0 {
            request = request.header(header::RANGE, format!("bytes={}-", offset));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status));
        }

        let resumed = status == StatusCode::PARTIAL_CONTENT;
        let content_length = response.content_length();
        let stream = response.bytes_stream().map_err(HttpError::Request).boxed();

        Ok(FetchResponse {
            resumed,
            content_length,
            stream,
        })
    }
}
