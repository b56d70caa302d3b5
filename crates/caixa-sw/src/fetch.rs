//! Request and response types seen by the fetch handler.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CacheEntry;

/// What the requested resource will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestDestination {
    /// Top-level document (a navigation).
    Document,
    Script,
    Style,
    Image,
    Font,
    Audio,
    Video,
    Manifest,
    /// fetch()/XHR and anything else without a destination.
    #[default]
    Empty,
}

/// Request mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

/// Response type, mirroring `Response.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    #[default]
    Basic,
    Cors,
    /// Cross-origin no-cors response; status and body are hidden.
    Opaque,
    /// Network error or synthetic failure.
    Error,
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: Url,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub destination: RequestDestination,
    pub mode: RequestMode,
}

impl FetchRequest {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            headers: HashMap::new(),
            destination: RequestDestination::Empty,
            mode: RequestMode::Cors,
        }
    }

    /// Create a top-level navigation request.
    pub fn navigate(url: Url) -> Self {
        Self {
            destination: RequestDestination::Document,
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    /// Create a request with an arbitrary method.
    pub fn with_method(url: Url, method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::get(url)
        }
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// GET is the only method the worker intercepts.
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Whether this request loads a top-level document.
    pub fn is_navigation(&self) -> bool {
        self.destination == RequestDestination::Document
    }
}

/// A response produced by the network, the cache, or the worker itself.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// Final URL, if known.
    pub url: Option<Url>,
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub response_type: ResponseType,
    /// Whether the response was served from a cache store.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Create a basic response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: None,
            status,
            status_text: reason_phrase(status).to_string(),
            headers: HashMap::new(),
            body: body.into(),
            response_type: ResponseType::Basic,
            from_cache: false,
        }
    }

    /// Create a 200 response.
    pub fn ok_with(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    /// Synthetic response for a request that could be served neither from
    /// the network nor from cache.
    pub fn offline() -> Self {
        let mut response = Self::new(503, "offline");
        response.response_type = ResponseType::Error;
        response
            .headers
            .insert("content-type".to_string(), "text/plain; charset=utf-8".to_string());
        response
    }

    /// Create a response from cache entry.
    pub fn from_cache(entry: &CacheEntry) -> Self {
        Self {
            url: Url::parse(&entry.url).ok(),
            status: entry.status,
            status_text: entry.status_text.clone(),
            headers: entry.headers.clone(),
            body: entry.body.clone(),
            response_type: entry.response_type,
            from_cache: true,
        }
    }

    /// Set the final URL.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Set the response type.
    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check if the status is 2xx.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only complete same-origin responses are written to cache at runtime.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}
