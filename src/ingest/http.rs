use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("request failed for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("unable to read response body for {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Client with the same limit applied to connecting and to each read.
/// Loopback targets bypass any system proxy.
pub fn build_client(url: &str, timeout: Duration) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .user_agent(concat!("smart-companion/", env!("CARGO_PKG_VERSION")));
    if is_loopback(url) {
        builder = builder.no_proxy();
    }
    builder
        .build()
        .map_err(|err| FetchError::Client(err.to_string()))
}

fn is_loopback(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .map(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]"))
        .unwrap_or(false)
}

/// GETs `url` as JSON and returns the raw body. Only `200 OK` counts as success.
pub async fn fetch_json_text(client: &Client, url: &str) -> Result<String, FetchError> {
    tracing::debug!(url, "requesting events");

    let response = client
        .get(url)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    tracing::debug!(%status, url, "events endpoint responded");

    if status != StatusCode::OK {
        let body = response
            .text()
            .await
            .ok()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| "no error body".to_string());
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }

    let body = response.text().await.map_err(|source| FetchError::Body {
        url: url.to_string(),
        source,
    })?;
    tracing::debug!(length = body.len(), "events body received");
    Ok(body)
}
