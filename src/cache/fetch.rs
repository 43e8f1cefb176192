use super::storage::AssetResponse;
use crate::errors::CacheError;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method};
use std::time::Duration;

/// An outbound request as seen by the cache worker.
#[derive(Debug, Clone)]
pub struct ShellRequest {
    pub method: Method,
    /// Absolute URL; also the cache key.
    pub url: String,
    /// True for top-level page loads.
    pub navigate: bool,
    pub body: Bytes,
}

impl ShellRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            navigate: false,
            body: Bytes::new(),
        }
    }

    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            navigate: true,
            ..Self::get(url)
        }
    }
}

/// Browsers mark page loads with `Sec-Fetch-Mode: navigate`; older clients
/// are recognised by a GET that accepts HTML.
pub fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    if *method != Method::GET {
        return false;
    }
    if let Some(mode) = headers.get("sec-fetch-mode") {
        return mode.as_bytes() == b"navigate";
    }
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, request: &ShellRequest) -> Result<AssetResponse, CacheError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CacheError::NetworkUnavailable(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ShellRequest) -> Result<AssetResponse, CacheError> {
        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|err| CacheError::NetworkUnavailable(err.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|err| CacheError::NetworkUnavailable(err.to_string()))?;

        Ok(AssetResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn navigation_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_navigation(&Method::GET, &headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html,*/*"));
        assert!(is_navigation(&Method::GET, &headers));
        assert!(!is_navigation(&Method::POST, &headers));

        headers.insert("sec-fetch-mode", HeaderValue::from_static("no-cors"));
        assert!(!is_navigation(&Method::GET, &headers));
    }
}
