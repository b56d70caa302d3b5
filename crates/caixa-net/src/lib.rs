//! # Caixa Net
//!
//! HTTP backend for the caixa-promessa worker: performs the network side of
//! cache misses and install-time precaching with reqwest.

use std::time::Duration;

use async_trait::async_trait;
use caixa_sw::{FetchRequest, FetchResponse, Network, RequestMode, ResponseType, SwError, SwResult};
use hashbrown::HashMap;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use thiserror::Error;
use tracing::{debug, info, trace};
use url::Url;

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<NetError> for SwError {
    fn from(err: NetError) -> Self {
        SwError::Network(err.to_string())
    }
}

/// Network configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Accept-Language header.
    pub accept_language: String,
    /// Per-request timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("caixa-promessa-sw/{}", env!("CARGO_PKG_VERSION")),
            accept_language: "pt-BR,pt;q=0.9,en;q=0.8".to_string(),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

/// reqwest-backed [`Network`].
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: Client,
    config: LoaderConfig,
}

impl HttpNetwork {
    /// Create a new HTTP network.
    pub fn new(config: LoaderConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(user_agent = %config.user_agent, "HttpNetwork initialized");

        Ok(Self { client, config })
    }

    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| NetError::InvalidMethod(request.method.clone()))?;

        let mut req_builder = self.client.request(method, request.url.clone());
        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name.as_str(), value.as_str());
        }
        if !has_header(request, "accept-language") {
            req_builder = req_builder.header("Accept-Language", &self.config.accept_language);
        }

        let response = req_builder.send().await?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = flatten_headers(response.headers());
        let body = response.bytes().await?;

        trace!(
            url = %final_url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        let response_type = classify(request, &final_url);
        if response_type == ResponseType::Opaque {
            return Ok(FetchResponse::new(0, Vec::new())
                .with_type(ResponseType::Opaque)
                .with_url(final_url));
        }

        let mut fetched = FetchResponse::new(status.as_u16(), body.to_vec())
            .with_type(response_type)
            .with_url(final_url);
        fetched.status_text = status.canonical_reason().unwrap_or_default().to_string();
        fetched.headers = headers;
        Ok(fetched)
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> SwResult<FetchResponse> {
        Ok(self.send(request).await?)
    }
}

fn has_header(request: &FetchRequest, name: &str) -> bool {
    request.headers.keys().any(|key| key.eq_ignore_ascii_case(name))
}

/// Repeated response headers (`Vary`, `Set-Cookie`) are joined with `", "`.
/// Values that are not visible ASCII are dropped.
fn flatten_headers(map: &HeaderMap) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = HashMap::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}

/// Response tainting: same-origin responses are basic, cross-origin ones are
/// cors, or opaque when the request was made in no-cors mode.
fn classify(request: &FetchRequest, final_url: &Url) -> ResponseType {
    if request.url.origin() == final_url.origin() {
        ResponseType::Basic
    } else if request.mode == RequestMode::NoCors {
        ResponseType::Opaque
    } else {
        ResponseType::Cors
    }
}
