//! HTTP client implementation

use crate::config::HttpConfig;
use crate::errors::HttpError;
use crate::types::HttpMethod;
use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, trace};
use url::Url;

/// A single request issued by a virtual user
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<JsonValue>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of the first header with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response as seen by the classifier: status, headers and the raw body
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Body rendered as text, replacing invalid UTF-8
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client trait for issuing requests against the target service
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// reqwest-backed client; one per virtual user
#[derive(Debug, Clone)]
pub struct HttpManager {
    client: Client,
    config: HttpConfig,
}

impl HttpManager {
    /// Create a new HttpManager with default configuration
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a new HttpManager with specific configuration
    pub fn with_config(config: HttpConfig) -> Result<Self, HttpError> {
        debug!(
            "Creating HttpManager with timeout: {}s",
            config.timeout.as_secs()
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .gzip(config.gzip)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout)
            .build()
            .map_err(|e| HttpError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl HttpClient for HttpManager {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        trace!("Building {} request to {}", request.method, request.url);

        let mut header_map = HeaderMap::new();
        for (key, value) in &request.headers {
            let name = HeaderName::from_str(key)
                .map_err(|_| HttpError::InvalidHeader(key.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| HttpError::InvalidHeader(format!("value of {}", key)))?;
            header_map.insert(name, value);
        }

        let mut builder = self
            .client
            .request(reqwest::Method::from(request.method), request.url)
            .headers(header_map);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await?;
        trace!("HTTP response received: {} ({} bytes)", status, body.len());

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
